use serde::Serialize;

/// A reader's opinion of an article. Stored as the `reaction_kind` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

/// Reaction counts for one article as seen by one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReactionState {
    pub likes: i64,
    pub dislikes: i64,
    pub is_liked: bool,
    pub is_disliked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReactionTotals {
    pub likes: i64,
    pub dislikes: i64,
}
