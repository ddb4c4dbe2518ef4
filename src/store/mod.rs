// Domain store: one JSON aggregate on disk, rewritten wholesale per mutation.
//
// Every mutating call reads the full document, applies one change in memory
// and writes the result back (unique temp file + rename) before returning.
// Writers are serialized by a lock shared between clones of the handle.

pub mod models;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::metrics;
use models::{
    Aggregate, BotConfig, CharacterChoice, RegisteredUser, StatField, Team, TeamMember, TeamRole,
    MAX_TEAM_NAME_LEN,
};

/// File name of the aggregate inside the data directory.
pub const DATA_FILE: &str = "data.json";

// ── Config paths ─────────────────────────────────────────────────────

pub const HOST_ROLE: &str = "roles.host";
pub const PANEL_CHANNEL: &str = "channels.panel";
pub const LEADERBOARD_CHANNEL: &str = "channels.leaderboard";
pub const PANEL_MESSAGE: &str = "messages.panel";
pub const LEADERBOARD_MESSAGE: &str = "messages.leaderboard";

/// Handle on the aggregate file. Cheap to clone; holds no cached state.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    dir: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl Store {
    /// Open the store under `dir`, creating the directory and an empty
    /// aggregate when absent. An existing file must parse.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let store = Store {
            path: dir.join(DATA_FILE),
            dir: dir.to_path_buf(),
            writer: Arc::new(Mutex::new(())),
        };
        if store.path.exists() {
            store.load()?;
        } else {
            store.persist(&Aggregate::default())?;
            tracing::info!(path = %store.path.display(), "Created empty data file");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole aggregate.
    pub fn snapshot(&self) -> StoreResult<Aggregate> {
        self.load().inspect_err(record_failure)
    }

    fn load(&self) -> StoreResult<Aggregate> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn persist(&self, aggregate: &Aggregate) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(aggregate)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        metrics::STORE_WRITES_TOTAL.inc();
        Ok(())
    }

    /// Read-modify-write. Nothing is written when `f` fails.
    fn update<T>(&self, f: impl FnOnce(&mut Aggregate) -> StoreResult<T>) -> StoreResult<T> {
        self.apply(f).inspect_err(record_failure)
    }

    fn apply<T>(&self, f: impl FnOnce(&mut Aggregate) -> StoreResult<T>) -> StoreResult<T> {
        // Held from load to persist. A poisoned lock guards no data.
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut aggregate = self.load()?;
        let out = f(&mut aggregate)?;
        self.persist(&aggregate)?;
        Ok(out)
    }

    // ── Config ───────────────────────────────────────────────────────

    /// Look up a config field by dotted path, e.g. `channels.panel`.
    pub fn get_config_value(&self, path: &str) -> StoreResult<Value> {
        let config = serde_json::to_value(self.snapshot()?.config)?;
        lookup(&config, path)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("config key {path}")))
    }

    /// Set a config field by dotted path. The key must already exist and the
    /// new value must keep the field's type (`null` allowed for optional refs).
    pub fn set_config_value(&self, path: &str, value: Value) -> StoreResult<()> {
        self.update(|agg| {
            let mut config = serde_json::to_value(&agg.config)?;
            let slot = lookup_mut(&mut config, path)
                .ok_or_else(|| StoreError::not_found(format!("config key {path}")))?;
            if !same_shape(slot, &value) {
                return Err(StoreError::Validation(format!(
                    "config key {path} cannot hold {value}"
                )));
            }
            *slot = value;
            agg.config = serde_json::from_value::<BotConfig>(config)
                .map_err(|e| StoreError::Validation(e.to_string()))?;
            Ok(())
        })?;
        tracing::info!(key = path, "Config value updated");
        Ok(())
    }

    /// Flip `config.setup`, returning the new value.
    pub fn toggle_setup(&self) -> StoreResult<bool> {
        let setup = self.update(|agg| {
            agg.config.setup = !agg.config.setup;
            Ok(agg.config.setup)
        })?;
        tracing::info!(setup, "Setup flag toggled");
        Ok(setup)
    }

    // ── Registrations ────────────────────────────────────────────────

    pub fn register(
        &self,
        user_id: &str,
        username: &str,
        choice: CharacterChoice,
    ) -> StoreResult<RegisteredUser> {
        let user = self.update(|agg| {
            if agg.registered_users.contains_key(user_id) {
                return Err(StoreError::Conflict(format!("user {user_id} already registered")));
            }
            let user = RegisteredUser {
                id: user_id.to_string(),
                registered: true,
                character_choice: choice,
                username: username.to_string(),
            };
            agg.registered_users.insert(user_id.to_string(), user.clone());
            Ok(user)
        })?;
        tracing::info!(user_id, character = %user.character_choice.character_id, "User registered");
        Ok(user)
    }

    /// Remove a registration outright.
    pub fn unregister(&self, user_id: &str) -> StoreResult<()> {
        self.update(|agg| {
            agg.registered_users
                .remove(user_id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(format!("registration for {user_id}")))
        })?;
        tracing::info!(user_id, "User unregistered");
        Ok(())
    }

    pub fn registration(&self, user_id: &str) -> StoreResult<Option<RegisteredUser>> {
        Ok(self.snapshot()?.registered_users.get(user_id).cloned())
    }

    pub fn is_registered(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self.snapshot()?.is_registered(user_id))
    }

    // ── Teams ────────────────────────────────────────────────────────

    /// Create a team with `leader` as its sole member and zeroed metadata.
    pub fn create_team(&self, mut leader: TeamMember, name: &str) -> StoreResult<Team> {
        let name = validate_team_name(name)?;
        leader.role = TeamRole::Leader;
        let team = self.update(|agg| {
            let team = Team {
                id: uuid::Uuid::new_v4().simple().to_string(),
                name,
                members: vec![leader],
                metadata: Default::default(),
            };
            agg.teams.insert(team.id.clone(), team.clone());
            Ok(team)
        })?;
        tracing::info!(team_id = %team.id, name = %team.name, "Team created");
        Ok(team)
    }

    /// Append a member. Capacity, duplicate membership and registration are
    /// the caller's responsibility; see `roster`.
    pub fn add_member(&self, team_id: &str, member: TeamMember) -> StoreResult<Team> {
        let user_id = member.id.clone();
        let team = self.update(|agg| {
            let team = team_mut(agg, team_id)?;
            team.members.push(member);
            Ok(team.clone())
        })?;
        tracing::info!(team_id, user_id = %user_id, "Member added");
        Ok(team)
    }

    /// Drop `user_id` from whichever team holds it. Leader protection is the
    /// caller's responsibility. Nothing is written when no team matches.
    pub fn remove_member(&self, user_id: &str) -> StoreResult<Team> {
        let team = self.update(|agg| {
            let team = agg
                .teams
                .values_mut()
                .find(|t| t.members.iter().any(|m| m.id == user_id))
                .ok_or_else(|| StoreError::not_found(format!("team containing {user_id}")))?;
            team.members.retain(|m| m.id != user_id);
            Ok(team.clone())
        })?;
        tracing::info!(team_id = %team.id, user_id, "Member removed");
        Ok(team)
    }

    pub fn find_team_containing(&self, user_id: &str) -> StoreResult<Option<Team>> {
        Ok(self.snapshot()?.team_containing(user_id).cloned())
    }

    pub fn team(&self, team_id: &str) -> StoreResult<Option<Team>> {
        Ok(self.snapshot()?.teams.get(team_id).cloned())
    }

    /// All teams, in id order.
    pub fn teams(&self) -> StoreResult<Vec<Team>> {
        Ok(self.snapshot()?.teams.into_values().collect())
    }

    pub fn rename_team(&self, team_id: &str, name: &str) -> StoreResult<Team> {
        let name = validate_team_name(name)?;
        let team = self.update(|agg| {
            let team = team_mut(agg, team_id)?;
            team.name = name;
            Ok(team.clone())
        })?;
        tracing::info!(team_id, name = %team.name, "Team renamed");
        Ok(team)
    }

    pub fn delete_team(&self, team_id: &str) -> StoreResult<Team> {
        let team = self.update(|agg| {
            agg.teams
                .remove(team_id)
                .ok_or_else(|| StoreError::not_found(format!("team {team_id}")))
        })?;
        tracing::info!(team_id, name = %team.name, "Team deleted");
        Ok(team)
    }

    // ── Scoring ──────────────────────────────────────────────────────

    /// Add `delta` to one member statistic. No clamping.
    pub fn adjust_member_stat(
        &self,
        team_id: &str,
        user_id: &str,
        field: StatField,
        delta: i64,
    ) -> StoreResult<TeamMember> {
        let member = self.update(|agg| {
            let member = member_mut(team_mut(agg, team_id)?, user_id)?;
            field.apply(&mut member.metadata, delta)?;
            Ok(member.clone())
        })?;
        tracing::debug!(team_id, user_id, ?field, delta, "Member stat adjusted");
        Ok(member)
    }

    /// Apply several deltas to one statistic in a single write. Any failure
    /// leaves every member unchanged.
    pub fn adjust_member_stats(
        &self,
        team_id: &str,
        field: StatField,
        deltas: &[(&str, i64)],
    ) -> StoreResult<Team> {
        let team = self.update(|agg| {
            let team = team_mut(agg, team_id)?;
            for (user_id, delta) in deltas {
                field.apply(&mut member_mut(team, user_id)?.metadata, *delta)?;
            }
            Ok(team.clone())
        })?;
        tracing::debug!(team_id, ?field, changed = deltas.len(), "Member stats adjusted");
        Ok(team)
    }

    /// Add to the team's points, returning the new total.
    pub fn add_points(&self, team_id: &str, amount: f64) -> StoreResult<f64> {
        let points = self.update(|agg| {
            let team = team_mut(agg, team_id)?;
            team.metadata.points += amount;
            Ok(team.metadata.points)
        })?;
        tracing::info!(team_id, amount, points, "Points added");
        Ok(points)
    }

    /// Subtract from the team's points. Totals may go negative.
    pub fn remove_points(&self, team_id: &str, amount: f64) -> StoreResult<f64> {
        let points = self.update(|agg| {
            let team = team_mut(agg, team_id)?;
            team.metadata.points -= amount;
            Ok(team.metadata.points)
        })?;
        tracing::info!(team_id, amount, points, "Points removed");
        Ok(points)
    }

    pub fn record_loss(&self, team_id: &str) -> StoreResult<i64> {
        self.update(|agg| {
            let team = team_mut(agg, team_id)?;
            team.metadata.losses += 1;
            Ok(team.metadata.losses)
        })
    }

    /// Recompute the floored rune average and persist it into `runes_avg`.
    pub fn compute_rune_average(&self, team_id: &str) -> StoreResult<i64> {
        self.update(|agg| {
            let team = team_mut(agg, team_id)?;
            team.metadata.runes_avg = team.rune_average();
            Ok(team.metadata.runes_avg)
        })
    }
}

fn record_failure(e: &StoreError) {
    if e.kind() == crate::error::ErrorKind::Io {
        metrics::STORE_FAILURES_TOTAL.inc();
        tracing::error!("Store failure: {e}");
    }
}

fn team_mut<'a>(agg: &'a mut Aggregate, team_id: &str) -> StoreResult<&'a mut Team> {
    agg.teams
        .get_mut(team_id)
        .ok_or_else(|| StoreError::not_found(format!("team {team_id}")))
}

fn member_mut<'a>(team: &'a mut Team, user_id: &str) -> StoreResult<&'a mut TeamMember> {
    team.members
        .iter_mut()
        .find(|m| m.id == user_id)
        .ok_or_else(|| StoreError::not_found(format!("member {user_id}")))
}

fn validate_team_name(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("team name is empty".into()));
    }
    if name.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(StoreError::Validation(format!(
            "team name is longer than {MAX_TEAM_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.as_object()?.get(key))
}

fn lookup_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(value, |v, key| v.as_object_mut()?.get_mut(key))
}

/// Whether `new` may replace `old` without changing the field's type.
fn same_shape(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::Object(_), _) | (_, Value::Object(_)) => false,
        (Value::Null, Value::String(_)) | (Value::String(_), Value::Null) => true,
        (Value::Null, Value::Null) => true,
        (Value::Bool(_), Value::Bool(_)) => true,
        (Value::String(_), Value::String(_)) => true,
        _ => false,
    }
}
