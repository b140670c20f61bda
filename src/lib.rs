//! Pulse: a news aggregation dashboard.
//!
//! Scrapes AI newsletters and Reddit, normalizes and dedupes articles into
//! a single JSON-backed local store, mirrors the store to a cloud replica
//! in the background, and serves the dashboard plus a JSON API over HTTP.
//! The local store is the source of truth; the mirror is eventually
//! consistent and never blocks local operations.

pub mod config;
pub mod ingest;
pub mod scrape;
pub mod server;
pub mod store;
pub mod sync;
pub mod util;
