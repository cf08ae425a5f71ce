//! Catalog dependency index
//!
//! Dependent resources (e.g. a `Workload`) name their owner (the `Node` they run on) in their own
//! data, but the catalog offers no reverse lookup. When an owner changes, every dependent must be
//! reconciled again, yet the owner's watch handler only sees the owner.
//!
//! The [`DependencyIndex`] bridges this gap. Dependent reconciliation records its current owner
//! with [`DependencyIndex::track`]; owner watches ask [`DependencyIndex::query`] for the reconcile
//! requests of every current dependent:
//!
//! ```text
//! [ Workload ] --track--> [ DependencyIndex ] <--query-- [ Node watch ]
//! ```
//!
//! The index is a derived cache. It is never persisted and is rebuilt with
//! [`DependencyIndex::reset`] from a full listing of dependents whenever watch continuity is lost.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod dependency;
pub mod metrics;
mod node_mapper;

#[cfg(test)]
mod tests;

pub use self::{
    dependency::{DependencyIndex, SharedIndex},
    metrics::IndexMetrics,
    node_mapper::{NodeMapper, WorkloadNodeMapper},
};
