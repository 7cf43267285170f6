//! # lib_reactions
//!
//! Client library for the live presentation reaction service. A presentation
//! is identified by an opaque server-assigned id and carries four reaction
//! counters. Viewers push reactions over a per-presentation WebSocket
//! channel; the server broadcasts a change trigger to every subscriber, and
//! each client reconciles by re-fetching the authoritative REST snapshot.

// Declare the modules to re-export
pub mod channel;
pub mod errors;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod transport;

// Re-export the public surface
pub use channel::{ChannelEvent, ChannelManager, ChannelSession, SessionState};
pub use errors::{ChannelError, ClientError, ReconciliationError, TransportError, ValidationError};
pub use model::{CreatedPresentation, Presentation, ReactionFrame, ReactionType};
pub use reconcile::Reconciler;
pub use store::SnapshotStore;
pub use transport::TransportClient;
