use crate::metrics::IndexMetrics;
use ahash::AHashMap as HashMap;
use catalog_controller_core::{Request, ResourceId, ResourceType, Tenancy};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

pub type SharedIndex = Arc<DependencyIndex>;

/// Maps owners to the reconcile requests of the resources that currently depend on them.
///
/// A single lock guards all state and every operation holds it for its whole duration, so readers
/// never observe a dependent that is half-way through moving between owners.
///
/// Only the owner -> dependents direction is stored. Removing a dependent scans every owner entry,
/// which bounds `untrack` (and a `track` that moves a dependent) by the number of tracked
/// dependents.
#[derive(Debug)]
pub struct DependencyIndex {
    by_owner: RwLock<ByOwner>,
    metrics: IndexMetrics,
}

/// Owners are keyed by type, tenancy, and name so that identically named owners of another kind or
/// in another tenancy never share dependents.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct OwnerKey {
    ty: ResourceType,
    tenancy: Tenancy,
    name: String,
}

/// Entries are never empty and never hold the same dependent twice.
type ByOwner = HashMap<OwnerKey, Vec<Request>>;

#[derive(Debug, PartialEq, Eq)]
enum Tracked {
    Unchanged,
    Added,
    Moved,
}

// === impl DependencyIndex ===

impl DependencyIndex {
    pub fn new(metrics: IndexMetrics) -> Self {
        Self {
            by_owner: RwLock::new(ByOwner::default()),
            metrics,
        }
    }

    pub fn shared(metrics: IndexMetrics) -> SharedIndex {
        Arc::new(Self::new(metrics))
    }

    /// Records that `dependent` is currently owned by `owner`.
    ///
    /// Re-tracking under the same owner is a no-op. Tracking under a different owner drops the
    /// prior association in the same critical section.
    ///
    /// # Panics
    ///
    /// If either id has an empty kind or name.
    #[track_caller]
    pub fn track(&self, dependent: ResourceId, owner: &ResourceId) {
        check_id("dependent", &dependent);
        check_id("owner", owner);

        let tracked = {
            let mut by_owner = self.by_owner.write();
            track_locked(&mut by_owner, dependent, OwnerKey::from(owner))
        };

        match tracked {
            Tracked::Unchanged => {}
            Tracked::Added => {
                self.metrics.tracks.inc();
            }
            Tracked::Moved => {
                self.metrics.tracks.inc();
                self.metrics.moves.inc();
            }
        }
    }

    /// Drops any association for `dependent`, regardless of its owner.
    ///
    /// # Panics
    ///
    /// If the id has an empty kind or name.
    #[track_caller]
    pub fn untrack(&self, dependent: &ResourceId) {
        check_id("dependent", dependent);

        let removed = untrack_locked(&mut self.by_owner.write(), dependent);
        match removed {
            Some(owner) => {
                debug!(%dependent, owner.tenancy = %owner.tenancy, owner.name = %owner.name, "Untracked");
                self.metrics.untracks.inc();
            }
            None => trace!(%dependent, "Not tracked"),
        }
    }

    /// Returns a reconcile request for each dependent currently tracked under `owner`.
    ///
    /// The result is a copy: it is unaffected by later updates to the index. Owners that are
    /// unknown to the index simply have no dependents.
    ///
    /// # Panics
    ///
    /// If the id has an empty kind or name.
    #[track_caller]
    pub fn query(&self, owner: &ResourceId) -> Vec<Request> {
        check_id("owner", owner);
        self.metrics.queries.inc();

        self.by_owner
            .read()
            .get(&OwnerKey::from(owner))
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces all state with the associations in `listing`, a full listing of
    /// `(dependent, owner)` pairs.
    ///
    /// Pairs are applied in order, as if each were tracked in turn, so a later pair for the same
    /// dependent wins.
    ///
    /// # Panics
    ///
    /// If any id has an empty kind or name. The index is left untouched in that case.
    #[track_caller]
    pub fn reset(&self, listing: impl IntoIterator<Item = (ResourceId, ResourceId)>) {
        let mut by_owner = ByOwner::default();
        for (dependent, owner) in listing {
            check_id("dependent", &dependent);
            check_id("owner", &owner);
            track_locked(&mut by_owner, dependent, OwnerKey::from(&owner));
        }

        let owners = by_owner.len();
        *self.by_owner.write() = by_owner;
        self.metrics.resets.inc();
        debug!(owners, "Reset");
    }

    /// The number of tracked dependents.
    pub fn len(&self) -> usize {
        self.by_owner.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.read().is_empty()
    }

    /// The number of owners with at least one tracked dependent.
    pub fn owner_count(&self) -> usize {
        self.by_owner.read().len()
    }

    /// Panics if an owner has no dependents or a dependent is tracked more than once.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let by_owner = self.by_owner.read();
        let mut seen = HashMap::<&ResourceId, &OwnerKey>::default();
        for (owner, reqs) in by_owner.iter() {
            assert!(!reqs.is_empty(), "owner {owner:?} has no dependents");
            for Request { id } in reqs {
                if let Some(prior) = seen.insert(id, owner) {
                    panic!("{id} is tracked by both {prior:?} and {owner:?}");
                }
            }
        }
    }
}

fn track_locked(by_owner: &mut ByOwner, dependent: ResourceId, owner: OwnerKey) -> Tracked {
    if by_owner
        .get(&owner)
        .is_some_and(|reqs| reqs.iter().any(|req| req.id == dependent))
    {
        trace!(%dependent, owner.name = %owner.name, "Already tracked");
        return Tracked::Unchanged;
    }

    // The dependent's owner reference has changed, so its prior association must go.
    let tracked = match untrack_locked(by_owner, &dependent) {
        Some(prior) => {
            debug!(%dependent, from = %prior.name, to = %owner.name, "Moved");
            Tracked::Moved
        }
        None => {
            debug!(%dependent, owner.name = %owner.name, "Tracked");
            Tracked::Added
        }
    };

    by_owner
        .entry(owner)
        .or_default()
        .push(Request::from(dependent));
    tracked
}

/// Removes `dependent` from whichever owner tracks it, returning that owner.
fn untrack_locked(by_owner: &mut ByOwner, dependent: &ResourceId) -> Option<OwnerKey> {
    let (owner, idx) = by_owner.iter().find_map(|(owner, reqs)| {
        let idx = reqs.iter().position(|req| req.id == *dependent)?;
        Some((owner.clone(), idx))
    })?;

    let reqs = by_owner.get_mut(&owner)?;
    if reqs.len() == 1 {
        by_owner.remove(&owner);
    } else {
        // Preserve the order of the remaining dependents.
        reqs.remove(idx);
    }
    Some(owner)
}

#[track_caller]
fn check_id(role: &str, id: &ResourceId) {
    if let Err(error) = id.validate() {
        panic!("invalid {role} resource id {id:?}: {error}");
    }
}

// === impl OwnerKey ===

impl From<&ResourceId> for OwnerKey {
    fn from(id: &ResourceId) -> Self {
        Self {
            ty: id.ty.clone(),
            tenancy: id.tenancy.clone(),
            name: id.name.clone(),
        }
    }
}
