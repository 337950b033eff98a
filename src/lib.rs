//! mysql-inspector - periodic MySQL health inspection library.
//!
//! This library provides the core functionality shared between:
//! - `mysql-inspectord` - background inspector with separate capture and inspection cadences
//! - `mysql-check` - one-shot health check
//!
//! Modules:
//! - `source` - metric source abstraction (MySQL, scripted mock)
//! - `storage` - snapshot model and bounded snapshot store
//! - `collector` - stateless and delta collectors, registry
//! - `health` - health levels and result aggregation
//! - `inspector` - dual-cadence scheduler and one-shot check
//! - `report` - output sinks (text, JSON, log)
//! - `config` - immutable runtime configuration
//! - `fmt` - shared formatting helpers
//! - `util` - logging setup

pub mod collector;
pub mod config;
pub mod fmt;
pub mod health;
pub mod inspector;
pub mod report;
pub mod source;
pub mod storage;
pub mod util;

/// Crate version, shared by both binaries.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
