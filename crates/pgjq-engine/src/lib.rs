//! Queue engine for pgjq.
//!
//! Every algorithm runs against `pgjq_core::JobStore`, so the same engine drives the
//! PostgreSQL store in production and the in-memory store in tests.
//! Concurrent consumers claim jobs through `ClaimScheduler`; the store guarantees that a
//! job has at most one active claim at a time.

pub mod claim;
pub mod client;
pub mod lister;
pub mod metrics;
pub mod queue;
pub mod reaper;
pub mod registry;
pub mod worker;

pub use claim::ClaimScheduler;
pub use client::Pgjq;
pub use lister::JobLister;
pub use metrics::MetricsAggregator;
pub use queue::JobQueue;
pub use reaper::StalenessReaper;
pub use registry::QueueRegistry;
pub use worker::{HandlerError, JobHandler, PollOutcome, Worker};
