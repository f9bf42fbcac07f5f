// ============================================================================
// planstore: Plan document service
// ============================================================================
//
// CRUD over a key-value primary store with content-hash optimistic
// concurrency, plus an asynchronously maintained search-index projection of
// each plan as a routed parent/child document tree.

pub mod app;
pub mod auth;
pub mod config;
pub mod core;
pub mod events;
pub mod index;
pub mod merge;
pub mod model;
pub mod service;
pub mod store;
pub mod web;

#[cfg(test)]
mod test_support;

pub use app::{Collaborators, PlanApp};
pub use config::AppConfig;
pub use crate::core::{PlanError, Result};
pub use model::Plan;
pub use service::PlanService;
