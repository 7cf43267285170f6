//! # Reconciliation Controller
//!
//! The single policy gate that turns "something may have changed" into
//! authoritative local state. Every inbound channel signal triggers a full
//! snapshot refetch; the result replaces the store wholesale. Full refetch
//! instead of incremental deltas sidesteps lost-update and out-of-order
//! delta reconciliation entirely.
//!
//! Concurrent fetches are coalesced by issuance order: each fetch carries a
//! monotonically increasing sequence number, and the store discards any
//! result whose sequence is lower than one already applied. A later-issued
//! fetch that resolves earlier therefore wins over an earlier-issued fetch
//! resolving late.
//!
//! A failed fetch is reported and changes nothing; the previously held
//! snapshot stays valid, and the view degrades to stale-but-refreshable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::errors::ReconciliationError;
use crate::store::SnapshotStore;
use crate::transport::TransportClient;

pub struct Reconciler {
    api: Arc<TransportClient>,
    presentation_id: String,
    store: Arc<SnapshotStore>,
    /// Sequence of the most recently issued fetch.
    issued: AtomicU64,
}

impl Reconciler {
    pub fn new(
        api: Arc<TransportClient>,
        presentation_id: impl Into<String>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            api,
            presentation_id: presentation_id.into(),
            store,
            issued: AtomicU64::new(0),
        }
    }

    /// The store this controller writes to.
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// One unconditional fetch at view mount, establishing the first
    /// known-good snapshot before any channel signal arrives.
    pub async fn initial_load(&self) -> Result<(), ReconciliationError> {
        let seq = self.next_seq();
        self.fetch_and_apply(seq).await
    }

    /// Awaitable refetch for manually triggered refreshes. Gated by the
    /// same sequence rule as everything else.
    pub async fn reconcile_now(&self) -> Result<(), ReconciliationError> {
        let seq = self.next_seq();
        self.fetch_and_apply(seq).await
    }

    /// Reacts to an inbound channel signal. The fetch runs as a spawned
    /// task so a slow response never blocks handling of later frames;
    /// later frames simply issue higher-sequence fetches.
    pub fn trigger(&self) {
        let seq = self.next_seq();
        let api = Arc::clone(&self.api);
        let presentation_id = self.presentation_id.clone();
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            match api.get_presentation(&presentation_id).await {
                Ok(snapshot) => {
                    if store.replace_if_newer(seq, snapshot) {
                        log::debug!("applied reconciliation fetch #{} for {}", seq, presentation_id);
                    } else {
                        log::debug!(
                            "discarded stale reconciliation fetch #{} for {}",
                            seq,
                            presentation_id
                        );
                    }
                }
                Err(e) => {
                    log::warn!(
                        "reconciliation fetch #{} failed for {}: {}",
                        seq,
                        presentation_id,
                        e
                    );
                }
            }
        });
    }

    fn next_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn fetch_and_apply(&self, seq: u64) -> Result<(), ReconciliationError> {
        let snapshot = self.api.get_presentation(&self.presentation_id).await?;
        self.store.replace_if_newer(seq, snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[derive(Clone)]
    struct ReconStub {
        hits: Arc<AtomicU64>,
        fail: Arc<AtomicBool>,
    }

    /// Answers with `heart` equal to the request count, so each response is
    /// distinguishable by arrival index.
    async fn get_handler(State(stub): State<ReconStub>) -> Response {
        let hit = stub.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if stub.fail.load(Ordering::SeqCst) {
            return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
        }
        Json(serde_json::json!({
            "success": true,
            "id": "P1",
            "title": "Demo",
            "description": "",
            "thumbs_up": 0,
            "heart": hit,
            "laugh": 0,
            "surprise": 0,
        }))
        .into_response()
    }

    async fn spawn_stub() -> (SocketAddr, ReconStub) {
        let stub = ReconStub {
            hits: Arc::new(AtomicU64::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        };
        let app = Router::new()
            .route("/presentations/{id}/", get(get_handler))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, stub)
    }

    fn reconciler_for(addr: SocketAddr) -> Reconciler {
        let api = Arc::new(TransportClient::new(&format!("http://{}", addr)).unwrap());
        Reconciler::new(api, "P1", Arc::new(SnapshotStore::new()))
    }

    #[tokio::test]
    async fn initial_load_establishes_first_snapshot() {
        let (addr, _stub) = spawn_stub().await;
        let reconciler = reconciler_for(addr);

        reconciler.initial_load().await.unwrap();
        let snapshot = reconciler.store().current().unwrap();
        assert_eq!(snapshot.id, "P1");
        assert_eq!(snapshot.heart, 1);
    }

    #[tokio::test]
    async fn later_issued_fetch_wins_over_earlier_one_resolving_late() {
        // Issue A then B, but let B's fetch complete first. B's response is
        // the first to hit the server (heart=1); A's resolves later
        // (heart=2) and must be discarded at apply time.
        let (addr, _stub) = spawn_stub().await;
        let reconciler = reconciler_for(addr);

        let seq_a = reconciler.next_seq();
        let seq_b = reconciler.next_seq();
        assert!(seq_a < seq_b);

        reconciler.fetch_and_apply(seq_b).await.unwrap();
        assert_eq!(reconciler.store().current().unwrap().heart, 1);

        reconciler.fetch_and_apply(seq_a).await.unwrap();
        // A resolved fine but lost the gate: B's state stays.
        assert_eq!(reconciler.store().current().unwrap().heart, 1);
    }

    #[tokio::test]
    async fn rapid_triggers_all_fetch_and_converge() {
        let (addr, stub) = spawn_stub().await;
        let reconciler = reconciler_for(addr);

        reconciler.trigger();
        reconciler.trigger();
        reconciler.trigger();

        for _ in 0..100 {
            if stub.hits.load(Ordering::SeqCst) >= 3 && reconciler.store().current().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(stub.hits.load(Ordering::SeqCst), 3);
        assert!(reconciler.store().current().is_some());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_snapshot() {
        let (addr, stub) = spawn_stub().await;
        let reconciler = reconciler_for(addr);

        reconciler.initial_load().await.unwrap();
        let before = reconciler.store().current().unwrap();

        stub.fail.store(true, Ordering::SeqCst);
        let err = reconciler.reconcile_now().await.unwrap_err();
        assert!(matches!(err, ReconciliationError::Fetch(_)));

        // Known-good state is never nulled out by a failed refetch.
        let after = reconciler.store().current().unwrap();
        assert_eq!(*after, *before);
    }
}
