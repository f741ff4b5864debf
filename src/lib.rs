//! # Content Insight
//!
//! Ingests user-submitted content (files, web pages, YouTube links, raw
//! text), asks a large-language-model API for a four-part study analysis
//! (summary, learning plan, insights, Q&A), and keeps both in a key-value
//! store with per-record expiry.
//!
//! ## Architecture
//!
//! ```text
//!  POST /api/upload ──▶ ingest ──┐
//!                                │
//!  POST /api/analyze ─▶ analyze ─┼──▶ KvStore (SQLite, TTL)
//!                        │       │
//!                        ▼       │
//!                     gateway    │
//!                                │
//!  /api/save-result ──▶ archive ─┘
//! ```
//!
//! The handlers never call each other. A client feeds ingestion output into
//! the analysis request and, optionally, the analysis into the archive.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Content and analysis records |
//! | [`store`] | Key-value store trait and backends |
//! | [`extract`] | File and web-page text extraction |
//! | [`youtube`] | YouTube link parsing |
//! | [`gateway`] | Completion-API client |
//! | [`ingest`] | Content ingestion |
//! | [`analyze`] | Analysis generation |
//! | [`archive`] | Saved-result archive |
//! | [`server`] | HTTP server |

pub mod analyze;
pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod server;
pub mod store;
pub mod youtube;
