use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the type of a catalog resource, e.g. `catalog.v1alpha1.Node`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub group: String,
    pub group_version: String,
    pub kind: String,
}

/// The scope a resource's name is unique within.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenancy {
    pub partition: String,
    pub namespace: String,
    pub peer_name: String,
}

/// Names a single resource. Two ids are equal when every component is equal.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    #[serde(rename = "type")]
    pub ty: ResourceType,
    #[serde(default)]
    pub tenancy: Tenancy,
    pub name: String,
}

/// A unit of work for a controller's work queue.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: ResourceId,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidId {
    #[error("resource id is missing a name")]
    MissingName,

    #[error("resource id is missing a kind")]
    MissingKind,
}

// === impl ResourceType ===

impl ResourceType {
    pub fn new(
        group: impl Into<String>,
        group_version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            group_version: group_version.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.group, self.group_version, self.kind)
    }
}

// === impl Tenancy ===

impl Tenancy {
    pub fn new(
        partition: impl Into<String>,
        namespace: impl Into<String>,
        peer_name: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            namespace: namespace.into(),
            peer_name: peer_name.into(),
        }
    }
}

impl Default for Tenancy {
    fn default() -> Self {
        Self::new("default", "default", "local")
    }
}

impl fmt::Display for Tenancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.partition, self.peer_name, self.namespace)
    }
}

// === impl ResourceId ===

impl ResourceId {
    pub fn new(ty: ResourceType, tenancy: Tenancy, name: impl Into<String>) -> Self {
        Self {
            ty,
            tenancy,
            name: name.into(),
        }
    }

    /// Checks that the id can name a resource at all.
    ///
    /// Tenancy components may be empty: the catalog fills in defaults upstream.
    pub fn validate(&self) -> Result<(), InvalidId> {
        if self.ty.kind.is_empty() {
            return Err(InvalidId::MissingKind);
        }
        if self.name.is_empty() {
            return Err(InvalidId::MissingName);
        }
        Ok(())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.ty, self.tenancy, self.name)
    }
}

// === impl Request ===

impl From<ResourceId> for Request {
    fn from(id: ResourceId) -> Self {
        Self { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> ResourceId {
        ResourceId::new(
            ResourceType::new("catalog", "v1alpha1", "Node"),
            Tenancy::default(),
            name,
        )
    }

    #[test]
    fn ids_compare_structurally() {
        assert_eq!(node("node-0"), node("node-0"));
        assert_ne!(node("node-0"), node("node-1"));

        let mut other = node("node-0");
        other.tenancy.partition = "other".to_string();
        assert_ne!(node("node-0"), other);
    }

    #[test]
    fn validate() {
        assert_eq!(node("node-0").validate(), Ok(()));
        assert_eq!(node("").validate(), Err(InvalidId::MissingName));

        let mut id = node("node-0");
        id.ty.kind.clear();
        assert_eq!(id.validate(), Err(InvalidId::MissingKind));
    }

    #[test]
    fn display() {
        assert_eq!(
            node("node-0").to_string(),
            "catalog.v1alpha1.Node/default.local.default/node-0"
        );
    }

    #[test]
    fn tenancy_defaults_when_omitted() {
        let id: ResourceId = serde_json::from_value(serde_json::json!({
            "type": { "group": "catalog", "groupVersion": "v1alpha1", "kind": "Node" },
            "name": "node-0",
        }))
        .unwrap();
        assert_eq!(id, node("node-0"));
    }
}
