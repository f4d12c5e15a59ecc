//! Continuum - session and workflow continuity for a guided product-management client.
//!
//! - `workflow`: infers step completion from new artifacts appearing in storage
//! - `notifications`: pending-review badge fed by a push channel, with alerts
//! - `session`: one "continue where you left off" record per actor
//!
//! `engine::ContinuityEngine` wires these to the backend collaborators.

pub mod backend;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod logging;
pub mod notifications;
pub mod session;
pub mod types;
pub mod workflow;
