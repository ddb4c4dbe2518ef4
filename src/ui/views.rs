// Concrete screens rendered by the bot's flows.

use crate::catalog::{self, PointGroup};
use crate::custom_id::{ComponentKind, CustomId};
use crate::store::models::{CharacterChoice, Team, TeamMember};

use super::{
    channel_types, error_card, notice_card, Button, ButtonStyle, MediaRef, Modal, Select,
    SelectOption, Tone, UiError, View, GOLD, GREEN, RED, YELLOW,
};

// ── Routing vocabulary shared with the bot ───────────────────────────

pub const CMD_REGISTER: &str = "register";
pub const CMD_TEAMS: &str = "teams";
pub const CMD_SETUP: &str = "setup";
pub const CMD_PANEL: &str = "panel";
pub const CMD_POINTS: &str = "points";

pub const ACTION_CONFIRM: &str = "confirm";
pub const ACTION_CANCEL: &str = "cancel";
pub const ACTION_CONTINUE: &str = "continue";
pub const ACTION_SELECT: &str = "select";
pub const ACTION_OPEN: &str = "open";
pub const ACTION_POINT: &str = "point";
pub const ACTION_KNOCK: &str = "knock";
pub const ACTION_BACK: &str = "back";
pub const ACTION_EDIT: &str = "edit";
pub const ACTION_STATS: &str = "stats";
pub const ACTION_END: &str = "end";

/// Correlation id of the long-lived public panel message.
pub const PUBLIC_PANEL_CORRELATION: &str = "public";

pub const GENERIC_FAILURE: &str =
    "Something went wrong while saving your changes. Please try again.";

fn relative_time(unix: i64) -> String {
    format!("<t:{unix}:R>")
}

/// Points as Discord renders them: `3`, `-2.25`.
pub fn fmt_points(points: f64) -> String {
    format!("{points}")
}

/// `Wylder (Dawn)`, falling back to raw ids for unknown entries.
pub fn choice_label(choice: &CharacterChoice) -> (String, String) {
    match catalog::resolve_choice(&choice.character_id, &choice.skin_id) {
        Some((c, s)) => (c.name.to_string(), s.name.to_string()),
        None => (choice.character_id.clone(), choice.skin_id.clone()),
    }
}

fn portrait(choice: &CharacterChoice) -> Option<MediaRef> {
    catalog::resolve_choice(&choice.character_id, &choice.skin_id)
        .map(|(c, s)| MediaRef::attachment(c.portrait(s)))
}

/// Flow timed out before the requester answered.
pub fn expired(command: &str) -> View {
    notice_card(
        Tone::Fail,
        format!("Interaction Expired. Please run /{command} again"),
    )
}

// ── Registration ─────────────────────────────────────────────────────

pub fn register_confirm(choice: &CharacterChoice, correlation: &str, expires_at: i64) -> View {
    let (character, skin) = choice_label(choice);
    let id = CustomId::new(ACTION_CONFIRM, correlation)
        .command(CMD_REGISTER)
        .kind(ComponentKind::Button);
    let mut inner = View::new();
    if let Some(media) = portrait(choice) {
        inner = inner.gallery(vec![media]);
    }
    let inner = inner
        .text(format!(
            "-# Please confirm your selection.\n# {character} ({skin})"
        ))
        .separator()
        .section(
            "Lock in this character for the event.",
            Button::new(&id, format!("Register as {character}"), ButtonStyle::Success),
        )
        .section(
            "Changed your mind?",
            Button::new(
                &id.with_action(ACTION_CANCEL),
                "Cancel Sign Up",
                ButtonStyle::Danger,
            ),
        )
        .text(format!("-# Expires {}", relative_time(expires_at)));
    View::new().container(Some(GOLD), inner)
}

pub fn register_cancelled() -> View {
    notice_card(Tone::Warning, "Sign up cancelled.")
}

pub fn register_success(choice: &CharacterChoice) -> View {
    let (character, skin) = choice_label(choice);
    notice_card(
        Tone::Success,
        format!(
            "## Successfully Registered\nYou are signed up as **{character} ({skin})**.\n\
             Please DM a tournament host to confirm your team placement."
        ),
    )
}

pub fn unregister_success() -> View {
    notice_card(
        Tone::Success,
        "## Successfully Unregistered\nYour registration has been removed.",
    )
}

// ── Teams ────────────────────────────────────────────────────────────

fn member_line(member: &TeamMember) -> String {
    let (character, skin) = choice_label(&member.character_choice);
    let crown = if member.is_leader() { "👑 " } else { "" };
    format!("- {crown}<@{}> ({character} - {skin})", member.id)
}

pub fn team_create_confirm(
    name: &str,
    leader: &TeamMember,
    correlation: &str,
    expires_at: i64,
) -> View {
    let id = CustomId::new(ACTION_CONFIRM, correlation)
        .command(CMD_TEAMS)
        .subcommand("create")
        .kind(ComponentKind::Button);
    let inner = View::new()
        .text(format!("## Creating Team ({name})\n{}", member_line(leader)))
        .separator()
        .buttons(vec![
            Button::new(&id, "Create Team", ButtonStyle::Success),
            Button::new(
                &id.with_action(ACTION_CANCEL),
                "Cancel Create Team",
                ButtonStyle::Danger,
            ),
        ])
        .text(format!("-# Expires {}", relative_time(expires_at)));
    View::new().container(Some(YELLOW), inner)
}

pub fn team_created(team: &Team) -> View {
    notice_card(
        Tone::Success,
        format!("## Successfully Created Team ({})\n-# ID {}", team.name, team.id),
    )
}

pub fn team_create_cancelled() -> View {
    notice_card(Tone::Warning, "Team creation cancelled.")
}

pub fn member_added(team: &Team) -> View {
    notice_card(
        Tone::Success,
        format!(
            "### Member Added to Team ({}/{} Members)\n-# Team ID: {}",
            team.members.len(),
            crate::store::models::MAX_TEAM_SIZE,
            team.id
        ),
    )
}

pub fn member_removed(team: &Team) -> View {
    notice_card(
        Tone::Success,
        format!(
            "### Member Removed from Team ({}/{} Members)\n-# Team ID: {}",
            team.members.len(),
            crate::store::models::MAX_TEAM_SIZE,
            team.id
        ),
    )
}

pub fn team_renamed(team: &Team) -> View {
    notice_card(
        Tone::Success,
        format!("### Team Renamed ({})\n-# Team ID: {}", team.name, team.id),
    )
}

pub fn team_delete_confirm(team: &Team, correlation: &str, expires_at: i64) -> View {
    let id = CustomId::new(ACTION_CONFIRM, correlation)
        .command(CMD_TEAMS)
        .subcommand("delete")
        .kind(ComponentKind::Button);
    let members: Vec<String> = team.members.iter().map(member_line).collect();
    let inner = View::new()
        .text(format!("## Deleting Team ({})\n{}", team.name, members.join("\n")))
        .separator()
        .buttons(vec![
            Button::new(&id, "Delete Team", ButtonStyle::Danger),
            Button::new(
                &id.with_action(ACTION_CANCEL),
                "Keep Team",
                ButtonStyle::Secondary,
            ),
        ])
        .text(format!("-# Expires {}", relative_time(expires_at)));
    View::new().container(Some(RED), inner)
}

pub fn team_deleted(name: &str) -> View {
    notice_card(Tone::Success, format!("## Deleted Team ({name})"))
}

pub fn team_delete_cancelled() -> View {
    notice_card(Tone::Warning, "Team deletion cancelled.")
}

// ── Setup wizard ─────────────────────────────────────────────────────

fn setup_id(correlation: &str, subcommand: &str, kind: ComponentKind, action: &str) -> CustomId {
    CustomId::new(action, correlation)
        .command(CMD_SETUP)
        .subcommand(subcommand)
        .kind(kind)
}

pub fn setup_intro(correlation: &str) -> View {
    let id = setup_id(correlation, "intro", ComponentKind::Button, ACTION_CONTINUE);
    View::new().container(
        Some(GOLD),
        View::new()
            .text(
                "## Bot Setup\nYou'll pick the event host role, the channel for the \
                 points panel and the channel for the leaderboard.",
            )
            .separator()
            .buttons(vec![Button::new(&id, "Continue", ButtonStyle::Primary)]),
    )
}

/// What a wizard selection step asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupTarget {
    HostRole,
    PanelChannel,
    LeaderboardChannel,
}

impl SetupTarget {
    pub fn subcommand(self) -> &'static str {
        match self {
            SetupTarget::HostRole => "host",
            SetupTarget::PanelChannel => "panel",
            SetupTarget::LeaderboardChannel => "leaderboard",
        }
    }

    fn title(self) -> &'static str {
        match self {
            SetupTarget::HostRole => "Select Event Host role",
            SetupTarget::PanelChannel => "Select Points Panel channel",
            SetupTarget::LeaderboardChannel => "Select Leaderboard channel",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            SetupTarget::HostRole => "role",
            SetupTarget::PanelChannel | SetupTarget::LeaderboardChannel => "channel",
        }
    }

    fn mention(self, id: &str) -> String {
        match self {
            SetupTarget::HostRole => format!("<@&{id}>"),
            _ => format!("<#{id}>"),
        }
    }
}

pub fn setup_select(target: SetupTarget, correlation: &str, invalid: bool) -> View {
    let sub = target.subcommand();
    let select = match target {
        SetupTarget::HostRole => Select::role(
            &setup_id(correlation, sub, ComponentKind::RoleSelect, ACTION_SELECT),
            "Select a role",
        ),
        SetupTarget::PanelChannel => Select::channel(
            &setup_id(correlation, sub, ComponentKind::ChannelSelect, ACTION_SELECT),
            "Select a channel",
            &[channel_types::GUILD_TEXT],
        ),
        SetupTarget::LeaderboardChannel => Select::channel(
            &setup_id(correlation, sub, ComponentKind::ChannelSelect, ACTION_SELECT),
            "Select a channel",
            &[
                channel_types::GUILD_TEXT,
                channel_types::GUILD_ANNOUNCEMENT,
                channel_types::PUBLIC_THREAD,
            ],
        ),
    };
    let mut inner = View::new().text(format!("## Bot Setup - {}", target.title()));
    if invalid {
        inner = inner.text(format!(
            "You've selected an invalid {}. Please select a new {} to continue.",
            target.noun(),
            target.noun()
        ));
    }
    let accent = if invalid { RED } else { GOLD };
    View::new().container(Some(accent), inner.separator().select(select))
}

pub fn setup_confirm(target: SetupTarget, correlation: &str, selected: &str, label: &str) -> View {
    let sub = target.subcommand();
    let confirm = setup_id(correlation, sub, ComponentKind::Button, ACTION_CONFIRM);
    let noun = target.noun();
    let heading = format!("**Selected {}{}:** {label}", noun[..1].to_uppercase(), &noun[1..]);
    let inner = View::new()
        .text(format!("## Bot Setup - {}", target.title()))
        .section(
            format!(
                "{heading} ({})\n\n-# If this is your preferred {noun}, press \"Confirm\". \
                 Otherwise pick another one below.",
                target.mention(selected)
            ),
            Button::new(&confirm, "Confirm", ButtonStyle::Success),
        )
        .separator()
        .select(match target {
            SetupTarget::HostRole => Select::role(
                &setup_id(correlation, sub, ComponentKind::RoleSelect, ACTION_SELECT),
                "Select a role",
            ),
            _ => Select::channel(
                &setup_id(correlation, sub, ComponentKind::ChannelSelect, ACTION_SELECT),
                "Select a channel",
                &[
                    channel_types::GUILD_TEXT,
                    channel_types::GUILD_ANNOUNCEMENT,
                    channel_types::PUBLIC_THREAD,
                ],
            ),
        });
    View::new().container(Some(GOLD), inner)
}

/// Final recap; `publish_error` is shown when the first panel could not be posted.
pub fn setup_complete(
    host_role: &str,
    panel_channel: &str,
    leaderboard_channel: &str,
    publish_error: Option<&str>,
) -> View {
    let mut inner = View::new().text(format!(
        "## Bot Setup - Setup Complete\n\
         - **Event Host role:** <@&{host_role}>\n\
         - **Points Panel channel:** <#{panel_channel}>\n\
         - **Leaderboard channel:** <#{leaderboard_channel}>"
    ));
    if let Some(err) = publish_error {
        inner = inner.separator().text(format!(
            "Failed to send the points panel to <#{panel_channel}>. \
             Check the bot's permissions in that channel.\n-# {err}"
        ));
    }
    let accent = if publish_error.is_some() { YELLOW } else { GREEN };
    View::new().container(Some(accent), inner)
}

pub fn setup_already_complete() -> View {
    notice_card(
        Tone::Info,
        "## Setup Already Complete\nThis server has already been set up.",
    )
}

// ── Scoring panel ────────────────────────────────────────────────────

pub fn team_heading(team: &Team) -> String {
    format!(
        "## `⭐ {}pt(s)` `👥 {}` {}",
        fmt_points(team.metadata.points),
        team.members.len(),
        team.name
    )
}

pub fn team_info(team: &Team) -> View {
    let mut inner = View::new()
        .text(format!("-# Managing Team\n{}", team_heading(team)))
        .text(format!(
            "-# Runes average: {} (bonus {}) · Expeditions lost: {}",
            team.metadata.runes_avg,
            catalog::rune_bonus(team.metadata.runes_avg),
            team.metadata.losses
        ))
        .separator();
    for member in &team.members {
        let (character, skin) = choice_label(&member.character_choice);
        let leader = if member.is_leader() { " 👑 Leader" } else { "" };
        let text = format!(
            "### <@{}>{leader}\n-# {character} ({skin})\n\
             Runes: **{}** · Enemies felled: **{}** · Times knocked down: **{}**",
            member.id,
            member.metadata.runes_total,
            member.metadata.kills,
            fmt_points(member.metadata.downs)
        );
        inner = match portrait(&member.character_choice) {
            Some(media) => inner.thumbnail_section(text, media),
            None => inner.text(text),
        };
    }
    View::new().container(Some(GOLD), inner)
}

fn panel_id(correlation: &str, action: &str) -> CustomId {
    CustomId::new(action, correlation)
        .command(CMD_PANEL)
        .kind(ComponentKind::Button)
}

/// Which stat a bulk form edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatForm {
    Kills,
    Runes,
    Downs,
}

impl StatForm {
    pub fn tag(self) -> &'static str {
        match self {
            StatForm::Kills => "kills",
            StatForm::Runes => "runes",
            StatForm::Downs => "downs",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "kills" => Some(StatForm::Kills),
            "runes" => Some(StatForm::Runes),
            "downs" => Some(StatForm::Downs),
            _ => None,
        }
    }

    /// Longest accepted input, sign included.
    pub fn max_length(self) -> usize {
        match self {
            StatForm::Runes => 15,
            StatForm::Kills | StatForm::Downs => 5,
        }
    }

    fn title(self) -> &'static str {
        match self {
            StatForm::Kills => "Edit Enemies Felled",
            StatForm::Runes => "Edit Rune Total",
            StatForm::Downs => "Edit Times Knocked Down",
        }
    }
}

pub fn control_panel(correlation: &str) -> View {
    let mut inner = View::new();
    for group in PointGroup::ALL {
        let style = match group {
            PointGroup::Deduction => ButtonStyle::Danger,
            _ => ButtonStyle::Secondary,
        };
        let sign = match group {
            PointGroup::Deduction => "-",
            _ => "+",
        };
        let buttons = catalog::sources_in(group)
            .map(|p| {
                Button::new(
                    &panel_id(correlation, &format!("{ACTION_POINT}-{}", p.id)),
                    format!("{} ({sign}{})", p.display_name, fmt_points(p.amount)),
                    style,
                )
            })
            .collect();
        inner = inner.text(format!("### {}", group.title())).buttons(buttons);
    }
    let edits = [StatForm::Kills, StatForm::Runes, StatForm::Downs]
        .into_iter()
        .map(|f| {
            Button::new(
                &panel_id(correlation, &format!("{ACTION_EDIT}-{}", f.tag())),
                f.title(),
                ButtonStyle::Secondary,
            )
        })
        .collect();
    inner = inner
        .separator()
        .text("### 👤 Edit Player Statistics")
        .buttons(edits)
        .separator()
        .buttons(vec![Button::new(
            &panel_id(correlation, ACTION_END),
            "End Session",
            ButtonStyle::Primary,
        )]);
    View::new().container(None, inner)
}

/// Member picker shown after a knock-down deduction.
pub fn knock_selector(team: &Team, correlation: &str) -> View {
    let buttons = team
        .members
        .iter()
        .map(|m| {
            let name = if m.username.is_empty() { m.id.as_str() } else { m.username.as_str() };
            Button::new(
                &panel_id(correlation, &format!("{ACTION_KNOCK}-{}", m.id)),
                name.to_string(),
                ButtonStyle::Danger,
            )
        })
        .collect();
    View::new().container(
        Some(RED),
        View::new()
            .text("### 💀 Who was knocked down?")
            .buttons(buttons)
            .separator()
            .buttons(vec![Button::new(
                &panel_id(correlation, ACTION_BACK),
                "Back",
                ButtonStyle::Secondary,
            )]),
    )
}

/// Team info followed by either the controls or the knock picker.
pub fn scoring_panel(team: &Team, correlation: &str, knock_select: bool) -> View {
    let controls = if knock_select {
        knock_selector(team, correlation)
    } else {
        control_panel(correlation)
    };
    let mut view = team_info(team);
    for element in controls.elements() {
        view = view.push(element.clone());
    }
    view
}

pub fn stat_modal(team: &Team, form: StatForm, correlation: &str) -> Modal {
    let id = CustomId::new(format!("{ACTION_STATS}-{}", form.tag()), correlation)
        .command(CMD_PANEL)
        .kind(ComponentKind::TextInput);
    let modal = Modal::new(&id, form.title()).max_length(form.max_length());
    team.members.iter().fold(modal, |modal, m| {
        let current = match form {
            StatForm::Kills => m.metadata.kills.to_string(),
            StatForm::Runes => m.metadata.runes_total.to_string(),
            StatForm::Downs => fmt_points(m.metadata.downs),
        };
        let label = if m.username.is_empty() { m.id.clone() } else { m.username.clone() };
        modal.input(
            m.id.clone(),
            label,
            format!("(current {current}) + or - number"),
        )
    })
}

pub fn session_ended() -> View {
    notice_card(
        Tone::Success,
        "Successfully ended your session. You can now choose a new team to edit.",
    )
}

pub fn session_stale() -> View {
    error_card("This scoring session is no longer active. Pick a team from the points panel.")
}

pub fn session_idle_released(team_name: &str) -> View {
    notice_card(
        Tone::Warning,
        format!("Your session for **{team_name}** was closed after a period of inactivity."),
    )
}

// ── Public points panel ──────────────────────────────────────────────

/// Teams by points, highest first; ties keep name order.
pub fn public_panel(teams: &[Team]) -> Result<View, UiError> {
    let mut sorted: Vec<&Team> = teams.iter().collect();
    sorted.sort_by(|a, b| {
        b.metadata
            .points
            .total_cmp(&a.metadata.points)
            .then_with(|| a.name.cmp(&b.name))
    });
    let mut inner = View::new().text(
        "## Points Panel\nPlease use the selector below to choose a team to manage.",
    );
    if sorted.is_empty() {
        inner = inner.separator().text("-# No teams have been created yet.");
        return Ok(View::new().container(Some(GOLD), inner));
    }
    inner = inner.separator();
    for team in &sorted {
        inner = inner.text(format!(
            "### `⭐ {}pt(s)` `👥 {}` {}",
            fmt_points(team.metadata.points),
            team.members.len(),
            team.name
        ));
    }
    let options = sorted
        .iter()
        .take(super::MAX_SELECT_OPTIONS)
        .map(|t| {
            SelectOption::new(t.name.clone(), t.id.clone())
                .description(format!("{} pt(s)", fmt_points(t.metadata.points)))
        })
        .collect();
    let id = CustomId::new(ACTION_OPEN, PUBLIC_PANEL_CORRELATION)
        .command(CMD_POINTS)
        .kind(ComponentKind::StringSelect);
    let inner = inner.separator().select(Select::string(&id, "Select a Team", options)?);
    Ok(View::new().container(Some(GOLD), inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{MemberStats, TeamRole, TeamStats};

    fn team(name: &str, points: f64, members: &[&str]) -> Team {
        Team {
            id: format!("id-{name}"),
            name: name.into(),
            members: members
                .iter()
                .enumerate()
                .map(|(i, id)| TeamMember {
                    id: id.to_string(),
                    role: if i == 0 { TeamRole::Leader } else { TeamRole::Member },
                    character_choice: CharacterChoice {
                        character_id: "wylder".into(),
                        skin_id: "dawn".into(),
                    },
                    metadata: MemberStats::default(),
                    username: format!("user-{id}"),
                })
                .collect(),
            metadata: TeamStats {
                points,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_fmt_points() {
        assert_eq!(fmt_points(3.0), "3");
        assert_eq!(fmt_points(-2.25), "-2.25");
    }

    #[test]
    fn test_public_panel_sorted_by_points() {
        let teams = vec![team("Low", 1.0, &["a"]), team("High", 9.0, &["b", "c"])];
        let text = public_panel(&teams).unwrap().plain_text();
        let high = text.find("High").unwrap();
        let low = text.find("Low").unwrap();
        assert!(high < low);
        assert!(text.contains("`⭐ 9pt(s)` `👥 2` High"));
    }

    #[test]
    fn test_public_panel_empty() {
        let view = public_panel(&[]).unwrap();
        assert!(view.custom_ids().is_empty());
    }

    #[test]
    fn test_control_panel_routes_every_point_source() {
        let ids = control_panel("42").custom_ids();
        for source in catalog::POINT_SOURCES {
            let expected = CustomId::new(format!("point-{}", source.id), "42")
                .command(CMD_PANEL)
                .kind(ComponentKind::Button)
                .encode();
            assert!(ids.contains(&expected), "missing {expected}");
        }
        assert!(ids.iter().all(|id| CustomId::decode(id).is_ok()));
    }

    #[test]
    fn test_stat_modal_one_input_per_member() {
        let t = team("Alpha", 0.0, &["a", "b", "c"]);
        let modal = stat_modal(&t, StatForm::Runes, "7");
        assert_eq!(modal.inputs.len(), 3);
        assert_eq!(modal.inputs[1].custom_id, "b");
        assert_eq!(modal.inputs[1].placeholder, "(current 0) + or - number");
        let id = CustomId::decode(&modal.custom_id).unwrap();
        assert_eq!(id.action, "stats-runes");
    }

    #[test]
    fn test_setup_select_invalid_flag() {
        let valid = setup_select(SetupTarget::HostRole, "1", false).plain_text();
        let invalid = setup_select(SetupTarget::HostRole, "1", true).plain_text();
        assert!(!valid.contains("invalid role"));
        assert!(invalid.contains("You've selected an invalid role."));
    }

    #[test]
    fn test_register_confirm_buttons() {
        let choice = CharacterChoice {
            character_id: "duchess".into(),
            skin_id: "wraith".into(),
        };
        let view = register_confirm(&choice, "99", 1_700_000_000);
        let text = view.plain_text();
        assert!(text.contains("# Duchess (Wraith)"));
        assert!(text.contains("<t:1700000000:R>"));
        let ids = view.custom_ids();
        assert_eq!(ids, vec!["register...Button.confirm#99", "register...Button.cancel#99"]);
    }
}
