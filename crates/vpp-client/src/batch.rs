//! # Batch Cursor
//!
//! Paged list operations (`getVPPUsersSrv`, `getVPPLicensesSrv`) thread an
//! opaque token pair through successive calls:
//!
//! ```text
//! Fresh ──batchToken──▶ InProgress ──sinceModifiedToken only──▶ CaughtUp
//!   ▲                     │    ▲                                   │
//!   │                     └────┘ batchToken                        │
//!   └──────────── neither token ◀────── next sync reuses cursor ───┘
//! ```
//!
//! `batchToken` means more pages of the same snapshot remain;
//! `sinceModifiedToken` means the snapshot is exhausted and the next call
//! returns only records changed since. If a response carries both, the batch
//! token wins and the cursor stays in progress.
//!
//! A cursor belongs to one pagination loop. Paged verbs take it by `&mut`
//! and advance it from each response.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::VppError;

/// Where a cursor is in its paged sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    /// No token yet: the next call starts a full listing.
    Fresh,
    /// More pages of the current snapshot remain.
    InProgress,
    /// The listing is exhausted; the next call fetches changes only.
    CaughtUp,
}

/// Pagination token pair threaded through paged list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCursor {
    #[serde(default)]
    batch_token: String,
    #[serde(default)]
    since_modified_token: String,
}

impl BatchCursor {
    /// An empty cursor; the next call lists everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume an interrupted listing from a saved batch token.
    pub fn resume(batch_token: impl Into<String>) -> Result<Self, VppError> {
        let batch_token = non_empty("batch token", batch_token.into())?;
        Ok(Self {
            batch_token,
            since_modified_token: String::new(),
        })
    }

    /// Fetch only records changed since a saved `sinceModifiedToken`.
    pub fn since_modified(token: impl Into<String>) -> Result<Self, VppError> {
        let since_modified_token = non_empty("since-modified token", token.into())?;
        Ok(Self {
            batch_token: String::new(),
            since_modified_token,
        })
    }

    pub fn state(&self) -> CursorState {
        if !self.batch_token.is_empty() {
            CursorState::InProgress
        } else if !self.since_modified_token.is_empty() {
            CursorState::CaughtUp
        } else {
            CursorState::Fresh
        }
    }

    /// True only while more pages of the current snapshot remain.
    pub fn has_next(&self) -> bool {
        self.state() == CursorState::InProgress
    }

    pub fn batch_token(&self) -> Option<&str> {
        Some(self.batch_token.as_str()).filter(|t| !t.is_empty())
    }

    pub fn since_modified_token(&self) -> Option<&str> {
        Some(self.since_modified_token.as_str()).filter(|t| !t.is_empty())
    }

    /// Fields to send with the next request. The two tokens are never sent
    /// together.
    pub(crate) fn request_fields(&self) -> CursorFields<'_> {
        match self.state() {
            CursorState::InProgress => CursorFields {
                batch_token: self.batch_token(),
                since_modified_token: None,
            },
            CursorState::CaughtUp => CursorFields {
                batch_token: None,
                since_modified_token: self.since_modified_token(),
            },
            CursorState::Fresh => CursorFields::default(),
        }
    }

    /// Adopt the tokens of a paged response.
    pub(crate) fn advance(&mut self, tokens: &PageTokens) {
        self.batch_token = tokens.batch_token.clone().unwrap_or_default();
        self.since_modified_token = tokens.since_modified_token.clone().unwrap_or_default();
    }
}

/// Batch tokens already followed during one walk over a listing.
#[derive(Debug, Default)]
pub(crate) struct TokenTrail {
    seen: HashSet<String>,
}

impl TokenTrail {
    /// Record the cursor's pending batch token. Fails when the token was
    /// already followed, since the walk would then never finish.
    pub(crate) fn follow(&mut self, operation: &str, cursor: &BatchCursor) -> Result<(), VppError> {
        match cursor.batch_token() {
            Some(token) if !self.seen.insert(token.to_string()) => Err(VppError::PagingCycle {
                operation: operation.to_string(),
                batch_token: token.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn non_empty(what: &str, token: String) -> Result<String, VppError> {
    if token.trim().is_empty() {
        return Err(VppError::InvalidRequest(format!("{what} must not be empty")));
    }
    Ok(token)
}

/// Cursor fields on a paged request.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CursorFields<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    since_modified_token: Option<&'a str>,
}

/// Pagination fields on a paged response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTokens {
    #[serde(default)]
    pub batch_token: Option<String>,
    #[serde(default)]
    pub since_modified_token: Option<String>,
    /// Estimated total; the service omits it on intermediate pages.
    #[serde(default)]
    pub total_count: Option<u64>,
}

/// A decoded page response exposing its pagination fields.
pub trait PagedResponse {
    fn tokens(&self) -> &PageTokens;
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: Option<u64>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
