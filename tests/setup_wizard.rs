// The /setup wizard driven through Bot::handle.

mod common;

use serde_json::json;

use common::*;
use tower_maiden::discord::model::{ResolvedChannel, ResolvedRole};
use tower_maiden::discord::{Reply, Resolved};
use tower_maiden::store::{
    HOST_ROLE as HOST_ROLE_PATH, LEADERBOARD_CHANNEL, PANEL_CHANNEL, PANEL_MESSAGE,
};

const SENDABLE: u64 = (1 << 10) | (1 << 11);

fn role(id: &str, managed: bool) -> Resolved {
    let mut resolved = Resolved::default();
    resolved.roles.insert(
        id.to_string(),
        ResolvedRole {
            name: format!("role-{id}"),
            managed,
        },
    );
    resolved
}

fn channel(id: &str, channel_type: u8, permissions: u64) -> Resolved {
    let mut resolved = Resolved::default();
    resolved.channels.insert(
        id.to_string(),
        ResolvedChannel {
            name: format!("chan-{id}"),
            channel_type,
            permissions,
        },
    );
    resolved
}

/// Select `value` on the current step, then confirm it.
async fn pick(h: &Harness, current: &Reply, value: &str, resolved: Resolved) -> Reply {
    let selected = h
        .bot
        .handle(select(ctx("admin", "w"), &id_for(current, "select"), &[value], resolved))
        .await;
    h.bot
        .handle(press(ctx("admin", "w"), &id_for(&selected, "confirm")))
        .await
}

#[tokio::test]
async fn test_full_wizard() {
    let h = harness();
    let intro = h.bot.handle(command(ctx("admin", "i1"), "setup", None, &[])).await;
    assert!(matches!(intro, Reply::Message { ephemeral: true, .. }));
    assert_eq!(h.bot.wizards.len(), 1);

    // Only the requester may drive it.
    let other = h
        .bot
        .handle(press(ctx("intruder", "x"), &id_for(&intro, "continue")))
        .await;
    assert_eq!(other, Reply::Acknowledge);

    let host_step = h
        .bot
        .handle(press(ctx("admin", "i2"), &id_for(&intro, "continue")))
        .await;

    // @everyone shares the guild id and is refused.
    let everyone = h
        .bot
        .handle(select(
            ctx("admin", "i3"),
            &id_for(&host_step, "select"),
            &[GUILD],
            role(GUILD, false),
        ))
        .await;
    assert!(text_of(&everyone).contains("You've selected an invalid role"));
    assert_eq!(
        h.bot.store.get_config_value(HOST_ROLE_PATH).unwrap(),
        serde_json::Value::Null
    );

    let panel_step = pick(&h, &everyone, "r1", role("r1", false)).await;
    assert_eq!(h.bot.store.get_config_value(HOST_ROLE_PATH).unwrap(), json!("r1"));

    // Voice channels cannot hold the panel.
    let voice = h
        .bot
        .handle(select(
            ctx("admin", "i4"),
            &id_for(&panel_step, "select"),
            &["v1"],
            channel("v1", 2, SENDABLE),
        ))
        .await;
    assert!(text_of(&voice).contains("invalid channel"));

    let leaderboard_step = pick(&h, &voice, "c1", channel("c1", 0, SENDABLE)).await;
    assert_eq!(h.bot.store.get_config_value(PANEL_CHANNEL).unwrap(), json!("c1"));

    let done = pick(&h, &leaderboard_step, "c2", channel("c2", 5, SENDABLE)).await;
    assert!(text_of(&done).contains("Setup Complete"));
    assert!(!text_of(&done).contains("Failed to send"));

    let config = h.bot.store.snapshot().unwrap().config;
    assert!(config.setup);
    assert_eq!(config.roles.host.as_deref(), Some("r1"));
    assert_eq!(config.channels.leaderboard.as_deref(), Some("c2"));
    assert!(h.bot.wizards.is_empty());

    // The first public panel went to the panel channel.
    assert_eq!(h.messenger.sends(), 1);
    assert!(matches!(&h.messenger.calls()[0], Call::Send { channel, .. } if channel == "c1"));
    assert_eq!(h.bot.store.get_config_value(PANEL_MESSAGE).unwrap(), json!("m1"));

    let again = h.bot.handle(command(ctx("admin", "i9"), "setup", None, &[])).await;
    assert!(text_of(&again).contains("Setup Already Complete"));
}

#[tokio::test]
async fn test_unsendable_channel_rejected() {
    let h = harness();
    let intro = h.bot.handle(command(ctx("admin", "i1"), "setup", None, &[])).await;
    let host_step = h
        .bot
        .handle(press(ctx("admin", "i2"), &id_for(&intro, "continue")))
        .await;
    let managed = h
        .bot
        .handle(select(
            ctx("admin", "i3"),
            &id_for(&host_step, "select"),
            &["bot-role"],
            role("bot-role", true),
        ))
        .await;
    assert!(text_of(&managed).contains("invalid role"));
    assert_eq!(
        h.bot.store.get_config_value(HOST_ROLE_PATH).unwrap(),
        serde_json::Value::Null
    );

    let panel_step = pick(&h, &managed, "r1", role("r1", false)).await;
    let muted = h
        .bot
        .handle(select(
            ctx("admin", "i4"),
            &id_for(&panel_step, "select"),
            &["c1"],
            channel("c1", 0, 1 << 10),
        ))
        .await;
    assert!(text_of(&muted).contains("invalid channel"));
    assert_eq!(
        h.bot.store.get_config_value(PANEL_CHANNEL).unwrap(),
        serde_json::Value::Null
    );
}

#[tokio::test]
async fn test_publish_failure_keeps_config() {
    let h = harness_with(RecordingMessenger {
        fail_sends: true,
        ..Default::default()
    });
    let intro = h.bot.handle(command(ctx("admin", "i1"), "setup", None, &[])).await;
    let host_step = h
        .bot
        .handle(press(ctx("admin", "i2"), &id_for(&intro, "continue")))
        .await;
    let panel_step = pick(&h, &host_step, "r1", role("r1", false)).await;
    let leaderboard_step = pick(&h, &panel_step, "c1", channel("c1", 0, SENDABLE)).await;
    let done = pick(&h, &leaderboard_step, "c2", channel("c2", 11, SENDABLE)).await;

    assert!(text_of(&done).contains("Failed to send the points panel to <#c1>"));
    let config = h.bot.store.snapshot().unwrap().config;
    assert!(config.setup);
    assert_eq!(config.channels.panel.as_deref(), Some("c1"));
    assert_eq!(
        h.bot.store.get_config_value(LEADERBOARD_CHANNEL).unwrap(),
        json!("c2")
    );
    assert!(config.messages.panel.is_none());
}

#[tokio::test]
async fn test_stale_wizard_control() {
    let h = harness();
    let reply = h
        .bot
        .handle(press(
            ctx("admin", "i1"),
            "setup..intro.Button.continue#gone",
        ))
        .await;
    assert!(text_of(&reply).contains("Please run /setup again"));
}
