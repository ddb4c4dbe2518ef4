// Background sweep that retires timed-out prompts, wizards and idle panels.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bot::Bot;
use crate::ui::views;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

pub fn spawn_sweeper(bot: Arc<Bot>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweep_once(&bot, Instant::now()).await;
        }
    })
}

/// One pass. Expired flows get their original message replaced; edit
/// failures are logged and otherwise ignored.
pub async fn sweep_once(bot: &Bot, now: Instant) {
    for (correlation, pending) in bot.confirmations.sweep_expired(now) {
        tracing::info!(%correlation, requester = %pending.requester, "Confirmation expired");
        let view = views::expired(pending.kind.command());
        if let Err(e) = bot.messenger().edit_original(&pending.token, &view).await {
            tracing::warn!(%correlation, "Failed to mark confirmation expired: {e}");
        }
    }

    for state in bot.wizards.sweep_expired(now) {
        tracing::info!(correlation = %state.correlation, "Setup wizard expired");
        if let Err(e) = bot
            .messenger()
            .edit_original(&state.token, &views::expired("setup"))
            .await
        {
            tracing::warn!(correlation = %state.correlation, "Failed to mark wizard expired: {e}");
        }
    }

    let Some(timeout) = bot.panel_idle_timeout() else {
        return;
    };
    let released = bot.panels.expire_idle(now, timeout);
    if released.is_empty() {
        return;
    }
    for session in &released {
        let name = match bot.store.team(&session.team_id) {
            Ok(Some(team)) => team.name,
            _ => session.team_id.clone(),
        };
        tracing::info!(
            team_id = %session.team_id,
            operator = %session.operator,
            "Idle scoring session released"
        );
        if let Err(e) = bot
            .messenger()
            .edit_original(&session.token, &views::session_idle_released(&name))
            .await
        {
            tracing::warn!(team_id = %session.team_id, "Failed to close idle panel: {e}");
        }
    }
    bot.refresh_panel().await;
}
