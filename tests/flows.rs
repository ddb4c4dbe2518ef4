// End-to-end flows through Bot::handle with a recording messenger:
// registration, team management, scoring sessions and expiry sweeps.

mod common;

use std::time::{Duration, Instant};

use serde_json::json;

use common::*;
use tower_maiden::custom_id::{ComponentKind, CustomId};
use tower_maiden::discord::{InboundEvent, Reply};
use tower_maiden::roster;
use tower_maiden::store::models::StatField;
use tower_maiden::store::{HOST_ROLE as HOST_ROLE_PATH, PANEL_CHANNEL, PANEL_MESSAGE};
use tower_maiden::sweeper::sweep_once;

fn register_user(h: &Harness, user: &str) {
    let name = format!("{user}-name");
    roster::register(&h.bot.store, user, &name, choice("wylder", "default")).unwrap();
}

fn panel_control(action: &str, correlation: &str) -> String {
    CustomId::new(action, correlation)
        .command("panel")
        .kind(ComponentKind::Button)
        .encode()
}

fn open_panel_id() -> String {
    CustomId::new("open", "public")
        .command("points")
        .kind(ComponentKind::StringSelect)
        .encode()
}

/// Host role configured and one team led by u1 with u2 as a member.
fn scoring_setup(h: &Harness) -> String {
    h.bot
        .store
        .set_config_value(HOST_ROLE_PATH, json!(HOST_ROLE))
        .unwrap();
    register_user(h, "u1");
    register_user(h, "u2");
    let team = roster::create_team(&h.bot.store, "u1", "Alpha").unwrap();
    roster::add_member(&h.bot.store, &team.id, "u2").unwrap();
    team.id
}

async fn open_session(h: &Harness, operator: &str, interaction: &str, team_id: &str) -> Reply {
    h.bot
        .handle(select(
            ctx_with_roles(operator, interaction, &[HOST_ROLE]),
            &open_panel_id(),
            &[team_id],
            Default::default(),
        ))
        .await
}

// ── Registration ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_confirm_flow() {
    let h = harness();
    let prompt = h
        .bot
        .handle(command(
            ctx("u1", "i1"),
            "register",
            None,
            &[("character", "wylder"), ("skin", "dawn")],
        ))
        .await;
    assert!(matches!(prompt, Reply::Message { ephemeral: true, .. }));
    assert!(!h.bot.store.is_registered("u1").unwrap());

    // Someone else pressing the button is ignored.
    let other = h.bot.handle(press(ctx("u2", "i2"), &id_for(&prompt, "confirm"))).await;
    assert_eq!(other, Reply::Acknowledge);

    let done = h.bot.handle(press(ctx("u1", "i3"), &id_for(&prompt, "confirm"))).await;
    assert!(matches!(done, Reply::Update(_)));
    assert!(text_of(&done).contains("Successfully Registered"));
    let user = h.bot.store.registration("u1").unwrap().unwrap();
    assert_eq!(user.character_choice, choice("wylder", "dawn"));
    assert_eq!(user.username, "u1-name");

    // A second press finds nothing pending.
    let again = h.bot.handle(press(ctx("u1", "i4"), &id_for(&prompt, "confirm"))).await;
    assert!(text_of(&again).contains("Interaction Expired"));

    let dup = h
        .bot
        .handle(command(
            ctx("u1", "i5"),
            "register",
            None,
            &[("character", "wylder"), ("skin", "dawn")],
        ))
        .await;
    assert!(text_of(&dup).contains("You are already registered."));
}

#[tokio::test]
async fn test_register_cancel_and_unknown_character() {
    let h = harness();
    let prompt = h
        .bot
        .handle(command(
            ctx("u1", "i1"),
            "register",
            None,
            &[("character", "wylder"), ("skin", "default")],
        ))
        .await;
    let cancelled = h.bot.handle(press(ctx("u1", "i2"), &id_for(&prompt, "cancel"))).await;
    assert!(text_of(&cancelled).contains("cancelled"));
    assert!(!h.bot.store.is_registered("u1").unwrap());

    let bad = h
        .bot
        .handle(command(
            ctx("u1", "i3"),
            "register",
            None,
            &[("character", "nobody"), ("skin", "default")],
        ))
        .await;
    assert!(text_of(&bad).contains("does not exist"));
}

#[tokio::test]
async fn test_unregister() {
    let h = harness();
    let missing = h.bot.handle(command(ctx("u1", "i1"), "unregister", None, &[])).await;
    assert!(text_of(&missing).contains("You are not registered."));

    register_user(&h, "u1");
    let done = h.bot.handle(command(ctx("u1", "i2"), "unregister", None, &[])).await;
    assert!(text_of(&done).contains("Successfully Unregistered"));
    assert!(!h.bot.store.is_registered("u1").unwrap());
}

// ── Teams ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_team_lifecycle_publishes_panel() {
    let h = harness();
    h.bot
        .store
        .set_config_value(PANEL_CHANNEL, json!("panel-chan"))
        .unwrap();
    for user in ["u1", "u2", "u3", "u4"] {
        register_user(&h, user);
    }

    let prompt = h
        .bot
        .handle(command(
            ctx("admin", "i1"),
            "teams",
            Some("create"),
            &[("name", "Alpha"), ("leader", "u1")],
        ))
        .await;
    let created = h.bot.handle(press(ctx("admin", "i2"), &id_for(&prompt, "confirm"))).await;
    assert!(text_of(&created).contains("Successfully Created Team (Alpha)"));
    let team = h.bot.store.find_team_containing("u1").unwrap().unwrap();
    assert!(team.members[0].is_leader());
    assert_eq!(h.messenger.sends(), 1);
    assert_eq!(
        h.bot.store.get_config_value(PANEL_MESSAGE).unwrap(),
        json!("m1")
    );

    for user in ["u2", "u3"] {
        let added = h
            .bot
            .handle(command(
                ctx("admin", "i3"),
                "teams",
                Some("add-member"),
                &[("team", team.id.as_str()), ("user", user)],
            ))
            .await;
        assert!(matches!(added, Reply::Message { .. }));
    }
    let full = h
        .bot
        .handle(command(
            ctx("admin", "i4"),
            "teams",
            Some("add-member"),
            &[("team", team.id.as_str()), ("user", "u4")],
        ))
        .await;
    assert!(text_of(&full).contains("maximum capacity (3/3)"));
    assert!(h.bot.store.find_team_containing("u4").unwrap().is_none());

    let leader = h
        .bot
        .handle(command(
            ctx("admin", "i5"),
            "teams",
            Some("remove-member"),
            &[("user", "u1")],
        ))
        .await;
    assert!(text_of(&leader).contains("leader can not be removed"));

    h.bot
        .handle(command(
            ctx("admin", "i6"),
            "teams",
            Some("remove-member"),
            &[("user", "u3")],
        ))
        .await;
    assert_eq!(h.bot.store.team(&team.id).unwrap().unwrap().members.len(), 2);

    // Each refresh deletes the previous panel before posting a new one.
    let calls = h.messenger.calls();
    assert!(calls.contains(&Call::Delete {
        channel: "panel-chan".into(),
        message: "m1".into(),
    }));

    let prompt = h
        .bot
        .handle(command(
            ctx("admin", "i7"),
            "teams",
            Some("delete"),
            &[("team", team.id.as_str())],
        ))
        .await;
    let deleted = h.bot.handle(press(ctx("admin", "i8"), &id_for(&prompt, "confirm"))).await;
    assert!(text_of(&deleted).contains("Deleted Team (Alpha)"));
    assert!(h.bot.store.teams().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_team_requires_registered_leader() {
    let h = harness();
    let reply = h
        .bot
        .handle(command(
            ctx("admin", "i1"),
            "teams",
            Some("create"),
            &[("name", "Alpha"), ("leader", "u9")],
        ))
        .await;
    assert!(text_of(&reply).contains("has not registered"));
    assert!(h.bot.confirmations.is_empty());
}

#[tokio::test]
async fn test_create_team_rejects_blank_name() {
    let h = harness();
    register_user(&h, "u1");
    let reply = h
        .bot
        .handle(command(
            ctx("admin", "i1"),
            "teams",
            Some("create"),
            &[("name", "   "), ("leader", "u1")],
        ))
        .await;
    assert!(matches!(reply, Reply::Message { ephemeral: true, .. }));
    assert!(text_of(&reply).contains("can not be blank"));
    assert!(h.bot.confirmations.is_empty());
}

#[tokio::test]
async fn test_team_autocomplete() {
    let h = harness();
    for (i, name) in ["Alpha", "Bravo", "Alpine", "Charlie"].iter().enumerate() {
        let user = format!("u{i}");
        register_user(&h, &user);
        roster::create_team(&h.bot.store, &user, name).unwrap();
    }
    let reply = h
        .bot
        .handle(InboundEvent::Autocomplete {
            ctx: ctx("admin", "i1"),
            name: "teams".into(),
            subcommand: Some("add-member".into()),
            focused: "team".into(),
            value: "alp".into(),
            options: Default::default(),
        })
        .await;
    let Reply::Choices(choices) = reply else {
        panic!("expected choices");
    };
    let mut names: Vec<_> = choices.iter().map(|c| c.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["Alpha", "Alpine"]);
}

// ── Scoring ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scoring_points_and_losses() {
    let h = harness();
    let team_id = scoring_setup(&h);

    let panel = open_session(&h, "op1", "s1", &team_id).await;
    assert!(matches!(panel, Reply::Message { ephemeral: true, .. }));
    assert_eq!(h.bot.panels.holder(&team_id).as_deref(), Some("op1"));

    let ctx_op = || ctx_with_roles("op1", "x", &[HOST_ROLE]);
    h.bot.handle(press(ctx_op(), &panel_control("point-boss", "s1"))).await;
    assert_eq!(h.bot.store.team(&team_id).unwrap().unwrap().metadata.points, 3.0);

    let reply = h.bot.handle(press(ctx_op(), &panel_control("point-loss", "s1"))).await;
    assert!(matches!(reply, Reply::Update(_)));
    let team = h.bot.store.team(&team_id).unwrap().unwrap();
    assert_eq!(team.metadata.points, -2.0);
    assert_eq!(team.metadata.losses, 1);
}

#[tokio::test]
async fn test_knock_down_flow() {
    let h = harness();
    let team_id = scoring_setup(&h);
    open_session(&h, "op1", "s1", &team_id).await;
    let ctx_op = || ctx_with_roles("op1", "x", &[HOST_ROLE]);

    let picker = h
        .bot
        .handle(press(ctx_op(), &panel_control("point-playerdown", "s1")))
        .await;
    assert_eq!(
        h.bot.store.team(&team_id).unwrap().unwrap().metadata.points,
        -0.25
    );
    let knock_u2 = id_for(&picker, "knock-u2");

    let back = h.bot.handle(press(ctx_op(), &knock_u2)).await;
    assert!(view_of(&back)
        .custom_ids()
        .iter()
        .any(|id| id.contains(".point-boss#")));
    let team = h.bot.store.team(&team_id).unwrap().unwrap();
    assert_eq!(team.member("u2").unwrap().metadata.downs, 1.0);
    assert_eq!(team.member("u1").unwrap().metadata.downs, 0.0);
}

#[tokio::test]
async fn test_bulk_stat_form() {
    let h = harness();
    let team_id = scoring_setup(&h);
    open_session(&h, "op1", "s1", &team_id).await;
    let ctx_op = || ctx_with_roles("op1", "x", &[HOST_ROLE]);

    let modal = h
        .bot
        .handle(press(ctx_op(), &panel_control("edit-runes", "s1")))
        .await;
    let Reply::Modal(modal) = modal else {
        panic!("expected a modal");
    };
    assert!(modal.inputs.iter().all(|i| i.max_length == Some(15)));

    let form_id = CustomId::new("stats-runes", "s1")
        .command("panel")
        .kind(ComponentKind::TextInput)
        .encode();
    let submit = |fields: &[(&str, &str)]| InboundEvent::ModalSubmit {
        ctx: ctx_op(),
        custom_id: form_id.clone(),
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    };

    // One bad value rejects the whole form.
    let bad = h.bot.handle(submit(&[("u1", "+300"), ("u2", "lots")])).await;
    assert!(matches!(bad, Reply::Message { ephemeral: true, .. }));
    let team = h.bot.store.team(&team_id).unwrap().unwrap();
    assert_eq!(team.member("u1").unwrap().metadata.runes_total, 0);

    let ok = h.bot.handle(submit(&[("u1", "+300"), ("u2", "100")])).await;
    assert!(matches!(ok, Reply::Update(_)));
    let team = h.bot.store.team(&team_id).unwrap().unwrap();
    assert_eq!(team.member("u1").unwrap().metadata.runes_total, 300);
    assert_eq!(team.metadata.runes_avg, 200);

    h.bot.handle(submit(&[("u1", "-50"), ("u2", "")])).await;
    let team = h.bot.store.team(&team_id).unwrap().unwrap();
    assert_eq!(team.member("u1").unwrap().metadata.runes_total, 250);
    assert_eq!(team.member("u2").unwrap().metadata.runes_total, 100);
    assert_eq!(team.metadata.runes_avg, 175);
}

#[tokio::test]
async fn test_stat_form_bounds() {
    let h = harness();
    let team_id = scoring_setup(&h);
    open_session(&h, "op1", "s1", &team_id).await;
    let form_id = CustomId::new("stats-kills", "s1")
        .command("panel")
        .kind(ComponentKind::TextInput)
        .encode();
    let submit = |fields: &[(&str, &str)]| InboundEvent::ModalSubmit {
        ctx: ctx_with_roles("op1", "x", &[HOST_ROLE]),
        custom_id: form_id.clone(),
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    };

    let long = h.bot.handle(submit(&[("u1", "+9000000000000000000")])).await;
    assert!(text_of(&long).contains("longer than 5 characters"));

    h.bot
        .store
        .adjust_member_stat(&team_id, "u1", StatField::Kills, i64::MAX - 10)
        .unwrap();
    let overflow = h.bot.handle(submit(&[("u2", "+7"), ("u1", "+99")])).await;
    assert!(text_of(&overflow).contains("out of range"));
    let team = h.bot.store.team(&team_id).unwrap().unwrap();
    assert_eq!(team.member("u1").unwrap().metadata.kills, i64::MAX - 10);
    assert_eq!(team.member("u2").unwrap().metadata.kills, 0);
}

#[tokio::test]
async fn test_session_exclusion_and_role_check() {
    let h = harness();
    let team_id = scoring_setup(&h);
    register_user(&h, "u3");
    let other_team = roster::create_team(&h.bot.store, "u3", "Bravo").unwrap();

    let no_role = h
        .bot
        .handle(select(
            ctx("op1", "s0"),
            &open_panel_id(),
            &[team_id.as_str()],
            Default::default(),
        ))
        .await;
    assert!(text_of(&no_role).contains("proper role"));
    assert!(h.bot.panels.is_empty());

    open_session(&h, "op1", "s1", &team_id).await;
    let taken = open_session(&h, "op2", "s2", &team_id).await;
    assert!(text_of(&taken).contains("already being managed by <@op1>"));

    let busy = open_session(&h, "op1", "s3", &other_team.id).await;
    assert!(text_of(&busy).contains("already managing a team"));
    assert_eq!(h.bot.panels.len(), 1);

    let unknown = open_session(&h, "op2", "s4", "missing").await;
    assert!(text_of(&unknown).contains("The chosen team was invalid."));

    // Controls from a panel other than the live one are stale.
    let stale = h
        .bot
        .handle(press(
            ctx_with_roles("op1", "x", &[HOST_ROLE]),
            &panel_control("point-boss", "old"),
        ))
        .await;
    assert!(text_of(&stale).contains("no longer active"));
    assert_eq!(h.bot.store.team(&team_id).unwrap().unwrap().metadata.points, 0.0);

    let ended = h
        .bot
        .handle(press(
            ctx_with_roles("op1", "x", &[HOST_ROLE]),
            &panel_control("end", "s1"),
        ))
        .await;
    assert!(text_of(&ended).contains("Successfully ended your session"));
    assert!(h.bot.panels.is_empty());
    let reopened = open_session(&h, "op2", "s5", &team_id).await;
    assert!(matches!(reopened, Reply::Message { ephemeral: true, .. }));
}

// ── Expiry ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sweep_expires_confirmations() {
    let h = harness();
    h.bot
        .handle(command(
            ctx("u1", "i1"),
            "register",
            None,
            &[("character", "wylder"), ("skin", "default")],
        ))
        .await;
    assert_eq!(h.bot.confirmations.len(), 1);

    sweep_once(&h.bot, Instant::now()).await;
    assert_eq!(h.bot.confirmations.len(), 1);

    sweep_once(&h.bot, Instant::now() + Duration::from_secs(31)).await;
    assert!(h.bot.confirmations.is_empty());
    let edits = h.messenger.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0, "tok-i1");
    assert!(edits[0].1.contains("Please run /register again"));
}

#[tokio::test]
async fn test_sweep_releases_idle_sessions() {
    let h = harness_idle(Duration::from_secs(60));
    let team_id = scoring_setup(&h);

    open_session(&h, "op1", "s1", &team_id).await;
    sweep_once(&h.bot, Instant::now() + Duration::from_secs(30)).await;
    assert_eq!(h.bot.panels.len(), 1);

    sweep_once(&h.bot, Instant::now() + Duration::from_secs(61)).await;
    assert!(h.bot.panels.is_empty());
    let edits = h.messenger.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0, "tok-s1");
    assert!(edits[0].1.contains("**Alpha**"));
}
