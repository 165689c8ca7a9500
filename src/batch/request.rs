//! Invocation request and response shapes

use crate::config::BatchConfig;
use crate::ScoutError;
use serde::{Deserialize, Serialize};

/// Largest batch a single invocation will process
pub const MAX_BATCH_SIZE: u32 = 1000;

/// HTTP-equivalent status for a completed or soft-failed invocation
pub const STATUS_OK: u16 = 200;

/// HTTP-equivalent status for an unexpected failure
pub const STATUS_ERROR: u16 = 500;

/// Parameters a caller passes to one invocation
///
/// Every field is optional; `limit` is accepted as an alias for `batchSize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_refresh: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl BatchRequest {
    /// Fills in defaults and clamps the batch size into `1..=MAX_BATCH_SIZE`
    pub fn cursor(&self, defaults: &BatchConfig) -> BatchCursor {
        let batch_size = self
            .batch_size
            .or(self.limit)
            .unwrap_or(defaults.default_batch_size)
            .clamp(1, MAX_BATCH_SIZE);

        BatchCursor {
            offset: self.offset.unwrap_or(0),
            batch_size,
            force_refresh: self.force_refresh.unwrap_or(false),
            store_code: self.store_code.unwrap_or(defaults.default_store_code),
        }
    }

    /// The request to issue next, or `None` once the catalog is covered
    ///
    /// In refresh mode the offset advances to `nextOffset` until a call
    /// processes nothing. In non-refresh mode calls repeat while rows remain
    /// and the previous call resolved at least one of them.
    pub fn follow_up(&self, summary: &BatchSummary) -> Option<BatchRequest> {
        if summary.processed == 0 {
            return None;
        }

        if self.force_refresh.unwrap_or(false) {
            if summary.next_offset >= summary.total {
                return None;
            }
            return Some(BatchRequest {
                offset: Some(summary.next_offset),
                ..self.clone()
            });
        }

        if summary.remaining == 0 || summary.updated == 0 {
            return None;
        }
        Some(self.clone())
    }
}

/// Resolved, resumable state of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCursor {
    pub offset: u64,
    pub batch_size: u32,
    pub force_refresh: bool,
    pub store_code: u32,
}

/// Aggregate progress reported after a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub processed: u64,
    pub updated: u64,
    pub errors: u64,
    pub remaining: u64,
    pub next_offset: u64,
    pub total: u64,
}

/// Envelope returned to the caller of an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: Option<BatchSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP-equivalent status; not part of the body
    #[serde(skip)]
    pub status: u16,
}

impl InvocationResponse {
    pub fn ok(summary: BatchSummary) -> Self {
        Self {
            success: true,
            summary: Some(summary),
            error: None,
            status: STATUS_OK,
        }
    }

    /// `success:false` with a non-error status
    pub fn soft_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: None,
            error: Some(message.into()),
            status: STATUS_OK,
        }
    }

    /// `success:false` with an error status
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: None,
            error: Some(message.into()),
            status: STATUS_ERROR,
        }
    }

    pub fn from_error(error: &ScoutError) -> Self {
        if error.is_soft_failure() {
            Self::soft_failure(error.to_string())
        } else {
            Self::failure(error.to_string())
        }
    }

    pub fn is_error_status(&self) -> bool {
        self.status >= STATUS_ERROR
    }
}
