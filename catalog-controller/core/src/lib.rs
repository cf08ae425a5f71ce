#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod catalog;
mod id;
mod resource;

pub use self::{
    catalog::{derive_owner_id, OwnerRef},
    id::{InvalidId, Request, ResourceId, ResourceType, Tenancy},
    resource::{DataParseError, Resource},
};
