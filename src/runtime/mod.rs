//! # Runtime
//!
//! Process wiring for the controller binary.
//!
//! - `initialization`: startup (TLS provider, tracing, metrics, clients)
//! - `watch_loop`: one kube-runtime controller per resource kind
//! - `error_policy`: per-resource Fibonacci retry scheduling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
