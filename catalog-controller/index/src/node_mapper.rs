use crate::SharedIndex;
use catalog_controller_core::{catalog::Workload, derive_owner_id, Request, Resource, ResourceId};

/// Maps watch events for `Node` resources to reconcile requests for the `Workload`s assigned to
/// each node.
pub trait NodeMapper: Send + Sync {
    /// Returns a reconcile request for every workload currently assigned to `node`.
    fn map_node_to_workloads(&self, node: &Resource) -> Vec<Request>;

    /// Associates `workload` with `node`, replacing any prior association.
    fn track_workload(&self, workload: ResourceId, node: &ResourceId);

    fn remove_workload_tracking(&self, workload: &ResourceId);

    fn node_id_from_workload(&self, workload: &Resource, data: &Workload) -> ResourceId;

    /// Replaces all tracking with a full listing of `(workload, node)` pairs.
    fn reset_workloads(&self, tracked: Vec<(ResourceId, ResourceId)>);
}

#[derive(Clone, Debug)]
pub struct WorkloadNodeMapper {
    index: SharedIndex,
}

// === impl WorkloadNodeMapper ===

impl WorkloadNodeMapper {
    pub fn new(index: SharedIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }
}

impl NodeMapper for WorkloadNodeMapper {
    fn map_node_to_workloads(&self, node: &Resource) -> Vec<Request> {
        self.index.query(&node.id)
    }

    fn track_workload(&self, workload: ResourceId, node: &ResourceId) {
        self.index.track(workload, node)
    }

    fn remove_workload_tracking(&self, workload: &ResourceId) {
        self.index.untrack(workload)
    }

    fn node_id_from_workload(&self, workload: &Resource, data: &Workload) -> ResourceId {
        derive_owner_id(workload, data)
    }

    fn reset_workloads(&self, tracked: Vec<(ResourceId, ResourceId)>) {
        self.index.reset(tracked)
    }
}
