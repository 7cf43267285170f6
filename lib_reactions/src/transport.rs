//! # REST Transport Client
//!
//! Thin wrapper around `reqwest` for the three presentation endpoints:
//! create, snapshot fetch, and the reaction fallback path. The client is
//! stateless and performs exactly one attempt per call; retry decisions
//! belong to the caller. Every call is bounded by a 30 second timeout.
//!
//! The service answers errors two ways: a non-2xx status, or an HTTP 200
//! body carrying `{"success": false, "error": "..."}`. Responses are first
//! decoded to a raw `serde_json::Value`, the envelope is checked, and only
//! then is the payload validated against the typed schema.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::errors::{ClientError, TransportError, ValidationError};
use crate::model::{CreatedPresentation, Presentation, ReactionFrame, ReactionType};

/// Upper bound for every REST call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the presentation REST endpoints.
pub struct TransportClient {
    client: reqwest::Client,
    base_url: Url,
}

impl TransportClient {
    /// Creates a client for the given absolute base URL.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url)?;
        // Relative joins drop the last path segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let fixed = format!("{}/", base_url.path());
            base_url.set_path(&fixed);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("lib_reactions/0.1")
            .build()?;

        Ok(Self { client, base_url })
    }

    /// The resolved base URL all paths are joined against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Creates a new presentation. An empty or whitespace-only title is
    /// rejected locally and never reaches the network.
    pub async fn create_presentation(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<CreatedPresentation, ClientError> {
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }

        let body = serde_json::json!({
            "title": title,
            "description": description.unwrap_or(""),
        });
        let value = self.post_json("presentations/create/", &body).await?;
        let created: CreatedPresentation =
            serde_json::from_value(value).map_err(TransportError::from)?;
        log::info!("created presentation '{}' ({})", created.title, created.id);
        Ok(created)
    }

    /// Fetches the authoritative snapshot for a presentation.
    pub async fn get_presentation(&self, id: &str) -> Result<Presentation, TransportError> {
        let path = format!("presentations/{}/", id);
        let value = match self.get_json(&path).await {
            Ok(value) => value,
            // The only rejection the fetch endpoint produces is an unknown id.
            Err(TransportError::Status(404)) | Err(TransportError::Rejected(_)) => {
                return Err(TransportError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e),
        };
        Ok(serde_json::from_value(value)?)
    }

    /// Submits a reaction over REST. Fallback path only; the primary path
    /// is the live channel.
    pub async fn submit_reaction(
        &self,
        id: &str,
        reaction: ReactionType,
    ) -> Result<String, TransportError> {
        let path = format!("presentations/{}/reactions/", id);
        let body =
            serde_json::to_value(ReactionFrame { reaction_type: reaction }).map_err(TransportError::from)?;
        let value = self.post_json(&path, &body).await?;
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();
        log::debug!("reaction '{}' accepted for {}", reaction, id);
        Ok(id)
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.base_url.join(path)?;
        let response = self.client.get(url).send().await?;
        Self::decode_envelope(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.base_url.join(path)?;
        let response = self.client.post(url).json(body).send().await?;
        Self::decode_envelope(response).await
    }

    /// Checks status and the `success` envelope flag, returning the raw
    /// body value for schema validation by the caller.
    async fn decode_envelope(response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let value: Value = response.json().await?;
        match value.get("success").and_then(Value::as_bool) {
            Some(true) | None => Ok(value),
            Some(false) => {
                let message = value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified server error")
                    .to_string();
                Err(TransportError::Rejected(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct StubState {
        presentations: Arc<Mutex<HashMap<String, Presentation>>>,
    }

    async fn create_handler(
        State(state): State<StubState>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let title = body.get("title").and_then(Value::as_str).unwrap_or("");
        if title.is_empty() {
            return Json(serde_json::json!({ "success": false, "error": "title is required" }));
        }
        let description = body
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let id = format!("P{}", state.presentations.lock().unwrap().len() + 1);
        let snapshot = Presentation {
            id: id.clone(),
            title: title.to_string(),
            description: description.clone(),
            created_at: Some("2026-08-30T00:00:00Z".to_string()),
            thumbs_up: 0,
            heart: 0,
            laugh: 0,
            surprise: 0,
        };
        state
            .presentations
            .lock()
            .unwrap()
            .insert(id.clone(), snapshot);
        Json(serde_json::json!({
            "success": true,
            "id": id,
            "title": title,
            "description": description,
        }))
    }

    async fn get_handler(
        State(state): State<StubState>,
        Path(id): Path<String>,
    ) -> Json<Value> {
        match state.presentations.lock().unwrap().get(&id) {
            Some(snapshot) => {
                let mut value = serde_json::to_value(snapshot).unwrap();
                value["success"] = Value::Bool(true);
                Json(value)
            }
            None => Json(serde_json::json!({ "success": false, "error": "presentation not found" })),
        }
    }

    async fn react_handler(
        State(state): State<StubState>,
        Path(id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let reaction = body
            .get("reaction_type")
            .and_then(Value::as_str)
            .unwrap_or("");
        let mut presentations = state.presentations.lock().unwrap();
        match presentations.get_mut(&id) {
            Some(snapshot) => {
                match reaction {
                    "thumbs_up" => snapshot.thumbs_up += 1,
                    "heart" => snapshot.heart += 1,
                    "laugh" => snapshot.laugh += 1,
                    "surprise" => snapshot.surprise += 1,
                    other => {
                        return Json(serde_json::json!({
                            "success": false,
                            "error": format!("invalid reaction type: {}", other),
                        }));
                    }
                }
                Json(serde_json::json!({ "success": true, "id": id }))
            }
            None => Json(serde_json::json!({ "success": false, "error": "presentation not found" })),
        }
    }

    async fn spawn_stub() -> SocketAddr {
        let state = StubState::default();
        let app = Router::new()
            .route("/presentations/create/", post(create_handler))
            .route("/presentations/{id}/", get(get_handler))
            .route("/presentations/{id}/reactions/", post(react_handler))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let addr = spawn_stub().await;
        let api = TransportClient::new(&format!("http://{}", addr)).unwrap();

        let created = api
            .create_presentation("Demo", Some("kickoff"))
            .await
            .unwrap();
        assert_eq!(created.title, "Demo");
        assert_eq!(created.description, "kickoff");

        let snapshot = api.get_presentation(&created.id).await.unwrap();
        assert_eq!(snapshot.id, created.id);
        assert_eq!(snapshot.title, "Demo");
        assert_eq!(snapshot.description, "kickoff");
        assert_eq!(snapshot.total_reactions(), 0);
    }

    #[tokio::test]
    async fn empty_title_is_rejected_before_any_network_call() {
        // Unroutable base URL: a validation failure must never hit the wire.
        let api = TransportClient::new("http://127.0.0.1:1/").unwrap();
        let err = api.create_presentation("   ", None).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyTitle)
        ));
    }

    #[tokio::test]
    async fn unknown_id_maps_to_not_found() {
        let addr = spawn_stub().await;
        let api = TransportClient::new(&format!("http://{}", addr)).unwrap();
        let err = api.get_presentation("missing").await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn rest_reaction_fallback_increments_counter() {
        let addr = spawn_stub().await;
        let api = TransportClient::new(&format!("http://{}", addr)).unwrap();
        let created = api.create_presentation("Fallback", None).await.unwrap();

        api.submit_reaction(&created.id, ReactionType::Laugh)
            .await
            .unwrap();
        api.submit_reaction(&created.id, ReactionType::Laugh)
            .await
            .unwrap();

        let snapshot = api.get_presentation(&created.id).await.unwrap();
        assert_eq!(snapshot.laugh, 2);
        assert_eq!(snapshot.thumbs_up, 0);
        assert_eq!(snapshot.heart, 0);
        assert_eq!(snapshot.surprise, 0);
    }

    #[tokio::test]
    async fn base_url_without_trailing_slash_still_joins() {
        let addr = spawn_stub().await;
        let api = TransportClient::new(&format!("http://{}", addr)).unwrap();
        assert!(api.base_url().path().ends_with('/'));
    }
}
