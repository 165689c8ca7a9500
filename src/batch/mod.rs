//! Batch invocations over the catalog
//!
//! This module contains the entry point callers use to enrich the catalog:
//! - Request parsing and cursor defaults
//! - The orchestrator that walks a slice of products
//! - The response envelope with resumable progress

mod orchestrator;
mod request;

pub use orchestrator::Orchestrator;
pub use request::{
    BatchCursor, BatchRequest, BatchSummary, InvocationResponse, MAX_BATCH_SIZE, STATUS_ERROR,
    STATUS_OK,
};
