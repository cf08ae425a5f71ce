//! Catalog workload-health controller
//!
//! Hosts the [`DependencyIndex`](index::DependencyIndex) for the workload -> node relationship
//! and dispatches watch events to it. Workload events keep the index current; node events are
//! mapped through the index to reconcile requests for every workload on that node.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use catalog_controller_core as core;
pub use catalog_controller_index as index;

mod args;
mod controller;

pub use self::{
    args::Args,
    controller::{Controller, Event},
};
