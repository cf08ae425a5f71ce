use crate::{
    core::{
        catalog::{Workload, GROUP_NAME, NODE_KIND, WORKLOAD_KIND},
        Request, Resource, ResourceId, ResourceType,
    },
    index::NodeMapper,
};
use anyhow::{anyhow, Result};
use futures::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};


/// A change to a catalog resource, as delivered by a watch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Event {
    Apply { resource: Resource },
    Delete { id: ResourceId },

    /// A full listing of the watched resources of one type, sent when a watch (re)starts.
    Resync {
        #[serde(rename = "type")]
        ty: ResourceType,
        resources: Vec<Resource>,
    },
}

/// Drives a [`NodeMapper`] from workload and node watch events, publishing reconcile requests to a
/// work queue.
pub struct Controller<M> {
    mapper: M,
    queue: mpsc::UnboundedSender<Request>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kind {
    Node,
    Workload,
    Other,
}

// === impl Controller ===

impl<M: NodeMapper> Controller<M> {
    pub fn new(mapper: M, queue: mpsc::UnboundedSender<Request>) -> Self {
        Self { mapper, queue }
    }

    /// Processes events until the stream ends or shutdown is signaled.
    ///
    /// Shutdown is only observed between events.
    pub async fn run(
        self,
        events: impl Stream<Item = Event>,
        drain: drain::Watch,
    ) -> Result<()> {
        tokio::pin! {
            let events = events;
            let shutdown = drain.signaled();
        }

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(event) => self.handle(event)?,
                    None => {
                        info!("Event stream ended");
                        return Ok(());
                    }
                },

                _ = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Applies a single event to the index, enqueueing the requests it produces.
    ///
    /// Fails only when the work queue has been closed.
    pub fn handle(&self, event: Event) -> Result<()> {
        match event {
            Event::Apply { resource } => {
                if !is_valid(&resource.id) {
                    return Ok(());
                }
                match Kind::of(&resource.id.ty) {
                    Kind::Workload => self.apply_workload(&resource),
                    Kind::Node => self.enqueue(self.mapper.map_node_to_workloads(&resource)),
                    Kind::Other => {
                        trace!(id = %resource.id, "Ignoring resource");
                        Ok(())
                    }
                }
            }

            Event::Delete { id } => {
                if !is_valid(&id) {
                    return Ok(());
                }
                match Kind::of(&id.ty) {
                    Kind::Workload => {
                        debug!(workload = %id, "Workload deleted");
                        self.mapper.remove_workload_tracking(&id);
                        Ok(())
                    }
                    Kind::Node => {
                        let node = Resource::new(id, serde_json::Value::Null);
                        self.enqueue(self.mapper.map_node_to_workloads(&node))
                    }
                    Kind::Other => {
                        trace!(%id, "Ignoring resource");
                        Ok(())
                    }
                }
            }

            Event::Resync { ty, resources } => match Kind::of(&ty) {
                Kind::Workload => self.resync_workloads(resources),
                Kind::Node => self.resync_nodes(resources),
                Kind::Other => {
                    trace!(%ty, "Ignoring resync");
                    Ok(())
                }
            },
        }
    }

    fn apply_workload(&self, workload: &Resource) -> Result<()> {
        let data = match workload.decode::<Workload>() {
            Ok(data) => data,
            Err(error) => {
                warn!(id = %workload.id, %error, "Skipping workload");
                return Ok(());
            }
        };

        if data.node_name.is_empty() {
            debug!(workload = %workload.id, "Workload is not assigned to a node");
            self.mapper.remove_workload_tracking(&workload.id);
        } else {
            let node = self.mapper.node_id_from_workload(workload, &data);
            self.mapper.track_workload(workload.id.clone(), &node);
        }

        self.enqueue(Some(Request::from(workload.id.clone())))
    }

    /// Rebuilds the index from a full listing of workloads and reconciles all of them.
    fn resync_workloads(&self, resources: Vec<Resource>) -> Result<()> {
        let mut tracked = Vec::with_capacity(resources.len());
        let mut reqs = Vec::with_capacity(resources.len());
        for resource in resources {
            if Kind::of(&resource.id.ty) != Kind::Workload {
                trace!(id = %resource.id, "Ignoring resource");
                continue;
            }
            if !is_valid(&resource.id) {
                continue;
            }

            match resource.decode::<Workload>() {
                Ok(data) if !data.node_name.is_empty() => {
                    let node = self.mapper.node_id_from_workload(&resource, &data);
                    tracked.push((resource.id.clone(), node));
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(id = %resource.id, %error, "Skipping workload");
                    continue;
                }
            }
            reqs.push(Request::from(resource.id));
        }

        info!(workloads = reqs.len(), tracked = tracked.len(), "Resyncing workloads");
        self.mapper.reset_workloads(tracked);
        self.enqueue(reqs)
    }

    /// Reconciles the workloads of every listed node. Tracking is left as is: it is derived
    /// from workloads alone.
    fn resync_nodes(&self, resources: Vec<Resource>) -> Result<()> {
        info!(nodes = resources.len(), "Resyncing nodes");
        for node in resources {
            if Kind::of(&node.id.ty) != Kind::Node {
                trace!(id = %node.id, "Ignoring resource");
                continue;
            }
            if is_valid(&node.id) {
                self.enqueue(self.mapper.map_node_to_workloads(&node))?;
            }
        }
        Ok(())
    }

    fn enqueue(&self, reqs: impl IntoIterator<Item = Request>) -> Result<()> {
        for req in reqs {
            trace!(id = %req.id, "Enqueueing");
            self.queue
                .send(req)
                .map_err(|_| anyhow!("work queue closed"))?;
        }
        Ok(())
    }
}

/// Ids arrive from watch input, so ill-formed ones are skipped rather than handed to the index.
fn is_valid(id: &ResourceId) -> bool {
    match id.validate() {
        Ok(()) => true,
        Err(error) => {
            warn!(?id, %error, "Skipping resource with an invalid id");
            false
        }
    }
}

// === impl Kind ===

impl Kind {
    fn of(ty: &ResourceType) -> Self {
        if ty.group != GROUP_NAME {
            return Self::Other;
        }
        match ty.kind.as_str() {
            NODE_KIND => Self::Node,
            WORKLOAD_KIND => Self::Workload,
            _ => Self::Other,
        }
    }
}
