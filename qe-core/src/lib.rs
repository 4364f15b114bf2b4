//! The tiered time-series query engine: window calculation, tier planning,
//! per-dimension interpolation and aggregation, and group-by.
//!
//! This crate owns the query algorithm only. Storage tiers, label/catalog
//! dictionaries and the request/response transport are the embedder's
//! concern, reached through the collaborator traits in [`storage`],
//! [`engine`] and [`contexts`].

#![deny(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

pub mod aggregate;
pub mod config;
pub mod contexts;
pub mod engine;
pub mod error;
pub mod group_by;
pub mod plan;
pub mod query_loop;
pub mod storage;
pub mod window;

pub use config::EngineConfig;
pub use engine::{Cancellation, Engine, GroupBySpec, MetricSource, QueryRequest};
pub use error::{QueryError, Result};
