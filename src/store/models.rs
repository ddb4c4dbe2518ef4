// Persisted entities: config, teams, members and registrations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Maximum number of members on one team.
pub const MAX_TEAM_SIZE: usize = 3;

/// Maximum length of a team name, in characters.
pub const MAX_TEAM_NAME_LEN: usize = 40;

/// The whole persisted document. Every mutation rewrites it as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    #[serde(default)]
    pub config: BotConfig,
    #[serde(default)]
    pub teams: BTreeMap<String, Team>,
    #[serde(default)]
    pub registered_users: BTreeMap<String, RegisteredUser>,
}

impl Aggregate {
    /// First team whose member list contains `user_id`.
    pub fn team_containing(&self, user_id: &str) -> Option<&Team> {
        self.teams
            .values()
            .find(|t| t.members.iter().any(|m| m.id == user_id))
    }

    pub fn is_registered(&self, user_id: &str) -> bool {
        self.registered_users
            .get(user_id)
            .map(|u| u.registered)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub setup: bool,
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub roles: RoleConfig,
    #[serde(default)]
    pub messages: MessageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub panel: Option<String>,
    pub leaderboard: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageConfig {
    pub panel: Option<String>,
    pub leaderboard: Option<String>,
}

/// A participant's character and cosmetic choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterChoice {
    pub character_id: String,
    pub skin_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: String,
    pub registered: bool,
    pub character_choice: CharacterChoice,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamRole {
    Leader,
    Member,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberStats {
    pub kills: i64,
    /// Fractional so knock corrections can be partial.
    pub downs: f64,
    pub runes_total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub role: TeamRole,
    pub character_choice: CharacterChoice,
    #[serde(default)]
    pub metadata: MemberStats,
    #[serde(default)]
    pub username: String,
}

impl TeamMember {
    /// A member with zeroed stats, built from a registration.
    pub fn from_registration(user: &RegisteredUser, role: TeamRole) -> Self {
        Self {
            id: user.id.clone(),
            role,
            character_choice: user.character_choice.clone(),
            metadata: MemberStats::default(),
            username: user.username.clone(),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == TeamRole::Leader
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    /// Signed and fractional; deductions may take a team below zero.
    pub points: f64,
    pub runes_avg: i64,
    pub losses: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub members: Vec<TeamMember>,
    #[serde(default)]
    pub metadata: TeamStats,
}

impl Team {
    pub fn member(&self, user_id: &str) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.id == user_id)
    }

    pub fn leader(&self) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.is_leader())
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_TEAM_SIZE
    }

    /// `floor(sum(runes_total) / member_count)`, zero for an empty team.
    pub fn rune_average(&self) -> i64 {
        if self.members.is_empty() {
            return 0;
        }
        let total: i64 = self.members.iter().map(|m| m.metadata.runes_total).sum();
        total.div_euclid(self.members.len() as i64)
    }
}

/// Per-member statistic addressed by stat edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    Kills,
    Downs,
    RunesTotal,
}

impl StatField {
    /// Add `delta`, refusing a total that would leave the `i64` range.
    pub fn apply(self, stats: &mut MemberStats, delta: i64) -> StoreResult<()> {
        let out_of_range =
            || StoreError::Validation(format!("{self:?} change of {delta} is out of range"));
        match self {
            StatField::Kills => {
                stats.kills = stats.kills.checked_add(delta).ok_or_else(out_of_range)?
            }
            StatField::Downs => stats.downs += delta as f64,
            StatField::RunesTotal => {
                stats.runes_total = stats
                    .runes_total
                    .checked_add(delta)
                    .ok_or_else(out_of_range)?
            }
        }
        Ok(())
    }
}
