//! insights-client — remote data fetcher for the workflow insights API.
//!
//! Issues authenticated `GET` requests against the project's workflow
//! insights resource and decodes each response into a
//! [`WorkflowInsightPage`](insights_core::WorkflowInsightPage).
//!
//! # Architecture
//!
//! ```text
//! InsightsClient
//!   ├── fetch_page(token) → one decoded page
//!   └── fetch_all()       → every page, tokens threaded through, concatenated
//!
//! InsightSource (trait) ← what the snapshot scheduler depends on
//! ```
//!
//! Every request carries an explicit timeout so a hung remote cannot stall
//! the caller indefinitely. Transport, HTTP status and decode failures are
//! reported as distinct [`FetchError`] variants, and [`FetchError::class`]
//! tells the caller whether a failure is worth retrying.

pub mod client;
pub mod error;

pub use client::{InsightSource, InsightsClient};
pub use error::{FailureClass, FetchError};
