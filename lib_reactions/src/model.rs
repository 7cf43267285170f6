//! Data model for presentations and reactions.
//!
//! Field names follow the wire format of the reaction service exactly, so
//! every struct here doubles as its own serde model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of reactions a viewer can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    ThumbsUp,
    Heart,
    Laugh,
    Surprise,
}

impl ReactionType {
    /// All four reaction types, in wire order.
    pub const ALL: [ReactionType; 4] = [
        ReactionType::ThumbsUp,
        ReactionType::Heart,
        ReactionType::Laugh,
        ReactionType::Surprise,
    ];

    /// The exact string sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::ThumbsUp => "thumbs_up",
            ReactionType::Heart => "heart",
            ReactionType::Laugh => "laugh",
            ReactionType::Surprise => "surprise",
        }
    }

    /// The emoji shown next to the counter.
    pub fn emoji(&self) -> &'static str {
        match self {
            ReactionType::ThumbsUp => "\u{1F44D}",
            ReactionType::Heart => "\u{2764}\u{FE0F}",
            ReactionType::Laugh => "\u{1F602}",
            ReactionType::Surprise => "\u{1F62E}",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbs_up" => Ok(ReactionType::ThumbsUp),
            "heart" => Ok(ReactionType::Heart),
            "laugh" => Ok(ReactionType::Laugh),
            "surprise" => Ok(ReactionType::Surprise),
            other => Err(format!("invalid reaction type: {}", other)),
        }
    }
}

/// Full snapshot of a presentation as returned by the REST endpoint.
///
/// Counters only ever move forward within a session; the client never
/// mutates them locally, it only replaces the whole snapshot with a re-read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Creation timestamp as reported by the server. Older deployments omit
    /// it from the GET response.
    #[serde(default)]
    pub created_at: Option<String>,
    pub thumbs_up: u64,
    pub heart: u64,
    pub laugh: u64,
    pub surprise: u64,
}

impl Presentation {
    /// Counter for a single reaction type.
    pub fn count(&self, reaction: ReactionType) -> u64 {
        match reaction {
            ReactionType::ThumbsUp => self.thumbs_up,
            ReactionType::Heart => self.heart,
            ReactionType::Laugh => self.laugh,
            ReactionType::Surprise => self.surprise,
        }
    }

    /// Sum of all four counters.
    pub fn total_reactions(&self) -> u64 {
        self.thumbs_up + self.heart + self.laugh + self.surprise
    }
}

/// Result of creating a presentation. Counters start at zero server-side,
/// so only the identity fields come back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedPresentation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// The single outbound frame shape: `{"reaction_type": "<type>"}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReactionFrame {
    pub reaction_type: ReactionType,
}
