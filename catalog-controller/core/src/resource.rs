use crate::ResourceId;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A catalog resource as delivered by a watch. The payload stays opaque until a controller decodes
/// it into the record type it expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
#[error("error parsing resource data as type {type_name:?}: {source}")]
pub struct DataParseError {
    pub type_name: &'static str,
    #[source]
    pub source: serde_json::Error,
}

// === impl Resource ===

impl Resource {
    pub fn new(id: ResourceId, data: serde_json::Value) -> Self {
        Self {
            id,
            version: String::new(),
            data,
        }
    }

    /// Parses the resource's data as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DataParseError> {
        T::deserialize(&self.data).map_err(|source| DataParseError {
            type_name: std::any::type_name::<T>(),
            source,
        })
    }
}
