//! Core types, engines and trait definitions for the FRS warehouse loader.
//!
//! This crate is deliberately free of database dependencies. It describes the
//! operational rows it reads, the star-schema rows it writes, and every
//! transformation in between: surrogate key allocation, Type 1 conformance,
//! SCD2 versioning, watermark tracking, fact assembly and the incremental
//! fact filter. Storage backends implement [`store::OperationalSource`] and
//! [`store::Warehouse`]; [`pipeline::EtlContext`] drives a run over them.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod conform;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod facts;
pub mod incremental;
pub mod keys;
pub mod normalize;
pub mod pipeline;
pub mod rejection;
pub mod scd2;
pub mod source;
pub mod store;
pub mod table;
pub mod watermark;

pub use error::{ConflictReport, Error, KeyConflict, Result};
pub use table::{FactTable, Table};
