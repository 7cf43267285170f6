//! Live view loop: one channel session + reconciler per watched
//! presentation, with exponential-backoff reconnection layered on top of the
//! single-shot session contract of `lib_reactions`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use lib_reactions::{
    ChannelEvent, ChannelManager, Presentation, ReactionType, Reconciler, SnapshotStore,
    TransportClient,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::Settings;

pub async fn run(settings: &Settings, presentation_id: &str) -> Result<()> {
    run_until(settings, presentation_id, tokio::signal::ctrl_c()).await
}

/// The watch loop proper, generic over the shutdown signal. The future is
/// pinned once up front so a signal arriving at any point, including during
/// a reconnect backoff sleep, ends the loop.
async fn run_until(
    settings: &Settings,
    presentation_id: &str,
    shutdown: impl Future,
) -> Result<()> {
    tokio::pin!(shutdown);

    let api = Arc::new(TransportClient::with_timeout(
        &settings.api_url,
        Duration::from_secs(settings.request_timeout_secs),
    )?);
    let store = Arc::new(SnapshotStore::new());
    let reconciler = Reconciler::new(Arc::clone(&api), presentation_id, Arc::clone(&store));

    // First known-good snapshot before any channel signal can arrive.
    reconciler.initial_load().await?;
    render(store.current().as_deref());
    println!("react by typing: t(humbs_up)  h(eart)  l(augh)  s(urprise)  + Enter");

    let mut manager = ChannelManager::new(&settings.ws_url)?;
    let mut render_rx = store.subscribe();
    let mut input_rx = spawn_stdin_reader();
    let mut stdin_open = true;

    let base_delay = Duration::from_millis(settings.reconnect_base_delay_ms);
    let max_delay = Duration::from_millis(settings.reconnect_max_delay_ms);
    let mut delay = base_delay;

    loop {
        let (session, mut events) = manager.open(presentation_id).await;

        let mut session_alive = true;
        while session_alive {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("shutting down");
                    manager.close().await;
                    return Ok(());
                }
                changed = render_rx.changed() => {
                    if changed.is_ok() {
                        render(store.current().as_deref());
                    }
                }
                line = input_rx.recv(), if stdin_open => match line {
                    Some(line) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match parse_reaction(trimmed) {
                            Some(reaction) => session.send(reaction),
                            None => log::warn!("unknown reaction input: {}", trimmed),
                        }
                    }
                    None => {
                        // stdin closed (piped input ended); keep watching.
                        stdin_open = false;
                    }
                },
                event = events.recv() => match event {
                    Some(ChannelEvent::Opened) => {
                        delay = base_delay;
                        log::info!("live updates connected");
                        // Absorb anything missed while disconnected.
                        reconciler.trigger();
                    }
                    Some(ChannelEvent::Frame(_)) => {
                        // Trigger-not-payload: any inbound frame means refetch.
                        reconciler.trigger();
                    }
                    Some(ChannelEvent::Error(e)) => {
                        log::warn!("channel: {}", e);
                    }
                    Some(ChannelEvent::Closed) | None => {
                        log::warn!("live updates paused; reconnecting in {:?}", delay);
                        session_alive = false;
                    }
                }
            }
        }

        // The backoff sleep also yields to shutdown; a signal landing here
        // would otherwise be lost until the next session loop.
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("shutting down");
                manager.close().await;
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(max_delay);
    }
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn parse_reaction(input: &str) -> Option<ReactionType> {
    match input {
        "t" | "thumbs_up" => Some(ReactionType::ThumbsUp),
        "h" | "heart" => Some(ReactionType::Heart),
        "l" | "laugh" => Some(ReactionType::Laugh),
        "s" | "surprise" => Some(ReactionType::Surprise),
        _ => None,
    }
}

pub fn render(snapshot: Option<&Presentation>) {
    let Some(p) = snapshot else {
        return;
    };
    println!(
        "{}  |  {} {}  {} {}  {} {}  {} {}",
        p.title,
        ReactionType::ThumbsUp.emoji(),
        p.thumbs_up,
        ReactionType::Heart.emoji(),
        p.heart,
        ReactionType::Laugh.emoji(),
        p.laugh,
        ReactionType::Surprise.emoji(),
        p.surprise,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::net::SocketAddr;
    use std::path::PathBuf;

    #[test]
    fn reaction_input_aliases() {
        assert_eq!(parse_reaction("t"), Some(ReactionType::ThumbsUp));
        assert_eq!(parse_reaction("heart"), Some(ReactionType::Heart));
        assert_eq!(parse_reaction("x"), None);
    }

    async fn snapshot_handler() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "success": true,
            "id": "P1",
            "title": "Demo",
            "description": "",
            "thumbs_up": 0,
            "heart": 0,
            "laugh": 0,
            "surprise": 0,
        }))
    }

    async fn spawn_snapshot_stub() -> SocketAddr {
        let app = Router::new().route("/presentations/{id}/", get(snapshot_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn shutdown_during_reconnect_backoff_ends_the_watch() {
        // No channel endpoint listens on port 1, so the session fails at
        // once and the loop sits in its 30s backoff sleep when the
        // shutdown signal fires.
        let addr = spawn_snapshot_stub().await;
        let settings = Settings {
            api_url: format!("http://{}", addr),
            ws_url: "ws://127.0.0.1:1".to_string(),
            log_dir: PathBuf::from("./logs"),
            log_level: "info".to_string(),
            request_timeout_secs: 5,
            reconnect_base_delay_ms: 30_000,
            reconnect_max_delay_ms: 60_000,
        };

        let shutdown = tokio::time::sleep(Duration::from_millis(300));
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_until(&settings, "P1", shutdown),
        )
        .await;
        outcome
            .expect("watch loop ignored shutdown during backoff")
            .unwrap();
    }
}
