//! # Clawdia research core
//!
//! Query routing and planning, a concurrent multi-provider search backend
//! with consensus/confidence scoring and rate limiting, a bounded-concurrency
//! headless-browser page pool, a content-addressed `SQLite` page cache with
//! full-text search, and a coverage/gate-driven research executor that ties
//! them together.
//!
//! ## Components
//!
//! - **Router & Planner**: classify a user prompt and turn it into a budgeted
//!   task spec of planned search/fetch actions.
//! - **Search backends & consensus**: race and cross-check Serper, `SerpApi`,
//!   Bing, and a scraping fallback, behind a shared rate limiter.
//! - **Page Pool**: bounded-concurrency headless-browser access for search
//!   and page-fetch operations.
//! - **Page Cache**: content-addressed, FTS5-indexed `SQLite` store of
//!   fetched pages and search history.
//! - **Executor**: runs planned actions against the page pool, tracks
//!   coverage against success criteria, and issues follow-up searches.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cli;
pub mod error;
pub mod research;

// Re-export commonly used types at crate root
pub use error::{CommandError, Error, Result, ResearchError, StorageError};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
