//! ClimSystems agent: API service, background worker and web placeholder.
//!
//! The API accepts asset upserts and analysis runs. Each run enqueues a
//! `RUN_ANALYSIS` job which the worker claims, analyses and resolves,
//! attaching evidence to the run:
//!
//! ```text
//! POST /v1/runs ──► run(queued) + job(queued)
//!                        │
//!   worker ── claim ◄────┘ ──► run(running) ──► evidence ──► run(done)
//!                                    └── error ──► run(failed), job retried
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`model`]: Assets, runs, jobs and evidence
//! - [`store`]: In-memory store and job queue
//! - [`worker`]: Job queue consumer and analysis backends
//! - [`api`]: HTTP API
//! - [`web`]: Web placeholder page
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod store;
pub mod utils;
pub mod web;
pub mod worker;

pub use config::Config;
pub use error::{AppError, Result};
