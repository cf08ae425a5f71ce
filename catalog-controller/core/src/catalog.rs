//! Catalog resource kinds and their data.
//!
//! Only the fields the dependency index relies on are modeled strictly; field-level validation
//! happens before a resource is ever written to the catalog.

use crate::{Resource, ResourceId, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GROUP_NAME: &str = "catalog";
pub const VERSION_V1ALPHA1: &str = "v1alpha1";

pub const NODE_KIND: &str = "Node";
pub const WORKLOAD_KIND: &str = "Workload";
pub const SERVICE_KIND: &str = "Service";

pub fn node_type() -> ResourceType {
    ResourceType::new(GROUP_NAME, VERSION_V1ALPHA1, NODE_KIND)
}

pub fn workload_type() -> ResourceType {
    ResourceType::new(GROUP_NAME, VERSION_V1ALPHA1, WORKLOAD_KIND)
}

pub fn service_type() -> ResourceType {
    ResourceType::new(GROUP_NAME, VERSION_V1ALPHA1, SERVICE_KIND)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,

    #[serde(default)]
    pub external: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    #[serde(default)]
    pub addresses: Vec<WorkloadAddress>,

    /// The name of the node this workload runs on, within the workload's own tenancy.
    #[serde(default)]
    pub node_name: String,

    #[serde(default)]
    pub identity: String,

    #[serde(default)]
    pub ports: BTreeMap<String, WorkloadPort>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadAddress {
    pub host: String,

    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default)]
    pub external: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadPort {
    pub port: u32,

    #[serde(default)]
    pub protocol: Protocol,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Http,
    Http2,
    Grpc,
}

/// Resource data that references an owning resource by name.
pub trait OwnerRef {
    /// The type of the owning resource.
    fn owner_type() -> ResourceType;

    /// The owner's name, as recorded in the dependent's data.
    fn owner_name(&self) -> &str;
}

impl OwnerRef for Workload {
    fn owner_type() -> ResourceType {
        node_type()
    }

    fn owner_name(&self) -> &str {
        &self.node_name
    }
}

/// Builds the id of the resource that owns `dependent`.
///
/// Owners are looked up within the dependent's tenancy.
pub fn derive_owner_id<D: OwnerRef>(dependent: &Resource, data: &D) -> ResourceId {
    ResourceId::new(
        D::owner_type(),
        dependent.id.tenancy.clone(),
        data.owner_name(),
    )
}
