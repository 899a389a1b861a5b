//! `specgov-core`: the specification graph and the tooling around it.
//!
//! The validation engine treats `specs/` as a typed, cross-referenced graph
//! and checks it in one fail-fast pass:
//!
//! ```text
//! collect ─► per file: schema ─► identity ─► domain_links (CAP)
//!         ─► trace (coverage gates) ─► delta ─► domain_registry ─► middleware
//! ```
//!
//! [`validate::run`] drives the pass. The [`ingest`] and [`taskgen`]
//! pipelines sit on top: ingest turns free text into artifacts (and uses the
//! validator as its gate), taskgen turns pending deltas into ordered
//! implementation tasks. Both talk to an LLM through
//! [`llm_client::ChatClient`].

pub mod collect;
pub mod config;
pub mod delta;
pub mod domain_links;
pub mod domain_registry;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod io;
pub mod markdown;
pub mod middleware;
pub mod paths;
pub mod schema;
pub mod taskgen;
pub mod trace;
pub mod types;
pub mod validate;
pub mod workspace;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{Result, SpecError};
pub use validate::ValidationSummary;
