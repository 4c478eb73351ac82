//! turnos-sync live monitor.
//!
//! Follows the live feeds of one headquarter (and optionally one ticket)
//! and logs every state change until interrupted.
//!
//! The headquarter comes from `TURNOS_HEADQUARTER_ID`, falling back to the
//! persisted selection. `TURNOS_TICKET_ID` adds the details and position
//! feeds of that ticket.

use tracing_subscriber::EnvFilter;

use turnos_sync::app_state::AppState;
use turnos_sync::config::SyncConfig;
use turnos_sync::domain::{
    HeadquarterId, InProgressTickets, LastTicketNumber, PendingTickets, PositionSnapshot,
    QueueKind, Ticket,
};
use turnos_sync::persistence::select_headquarter;
use turnos_sync::service::AdviserDesk;
use turnos_sync::sync::{Feed, LiveReceiver, LiveState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_flag("TURNOS_LOG_JSON") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let state = AppState::from_config(&config)?;
    tracing::info!(
        api = %config.api_base_url,
        ws = %config.ws_url,
        mode = ?config.transport_mode,
        "starting turnos-sync monitor"
    );

    let mut settings = state.settings.load()?;
    if let Some(hq) = env_value("TURNOS_HEADQUARTER_ID") {
        settings = select_headquarter(state.settings.as_ref(), Some(HeadquarterId::new(hq)))?;
    }
    let headquarter = settings.headquarter_id.clone();
    if headquarter.is_none() {
        tracing::warn!("no headquarter selected; queue feeds stay idle");
    }
    let hq_key = headquarter.as_ref().map(ToString::to_string);

    let mut priority = state.subscribe(Feed::pending_tickets(QueueKind::Priority));
    let mut regular = state.subscribe(Feed::pending_tickets(QueueKind::Regular));
    let mut in_progress = state.subscribe(Feed::in_progress_tickets());
    let mut last_number = state.subscribe(Feed::last_ticket_number());

    tokio::spawn(follow(priority.feed().name(), priority.watch(), describe_pending));
    tokio::spawn(follow(regular.feed().name(), regular.watch(), describe_pending));
    tokio::spawn(follow(last_number.feed().name(), last_number.watch(), describe_last_number));
    let desk = settings
        .user
        .as_ref()
        .and_then(|user| user.module_id.clone())
        .map(|module| state.adviser_desk(module));
    tokio::spawn(follow_in_progress(in_progress.watch(), desk));

    priority.mount(hq_key.clone());
    regular.mount(hq_key.clone());
    in_progress.mount(hq_key.clone());
    last_number.mount(hq_key);

    let ticket_key = env_value("TURNOS_TICKET_ID");
    let mut details = state.subscribe(Feed::ticket_details());
    let mut position = state.subscribe(Feed::ticket_position());
    if ticket_key.is_some() {
        tokio::spawn(follow(details.feed().name(), details.watch(), describe_ticket));
        tokio::spawn(follow(position.feed().name(), position.watch(), describe_position));
        details.mount(ticket_key.clone());
        position.mount(ticket_key);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    priority.unmount();
    regular.unmount();
    in_progress.unmount();
    last_number.unmount();
    details.unmount();
    position.unmount();

    Ok(())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(key: &str) -> bool {
    env_value(key).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Logs every state change of one feed until its subscription goes away.
async fn follow<T: Clone>(feed: &'static str, mut rx: LiveReceiver<T>, describe: fn(&T) -> String) {
    loop {
        match rx.state() {
            LiveState::Idle => tracing::debug!(feed, "idle"),
            LiveState::Loading => tracing::debug!(feed, "loading"),
            LiveState::Error(message) => tracing::warn!(feed, %message, "unavailable"),
            LiveState::Data(value) => tracing::info!(feed, summary = %describe(&value), "update"),
        }
        if !rx.changed().await {
            break;
        }
    }
}

async fn follow_in_progress(mut rx: LiveReceiver<InProgressTickets>, desk: Option<AdviserDesk>) {
    loop {
        if let LiveState::Data(snapshot) = rx.state() {
            tracing::info!(feed = "in-progress-tickets", count = snapshot.tickets.len(), "update");
            if let Some(desk) = &desk {
                let free = desk.check_can_start(Some(&snapshot)).is_ok();
                tracing::info!(module_id = %desk.module_id(), free, "module availability");
            }
        }
        if !rx.changed().await {
            break;
        }
    }
}

fn describe_pending(pending: &PendingTickets) -> String {
    let next = pending
        .tickets
        .first()
        .map_or_else(|| "-".to_string(), |t| t.number.to_string());
    format!("{} pending, next #{next}", pending.count_pending_tickets)
}

fn describe_last_number(last: &LastTicketNumber) -> String {
    format!("last issued #{}", last.last_number)
}

fn describe_ticket(ticket: &Ticket) -> String {
    format!("ticket #{} {}", ticket.number, ticket.status)
}

fn describe_position(position: &PositionSnapshot) -> String {
    match position.estimated_wait_secs {
        Some(secs) => format!("{} ahead, ~{secs}s", position.position),
        None => format!("{} ahead", position.position),
    }
}
