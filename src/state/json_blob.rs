//! Serde adapter storing a metadata map as embedded JSON text.
//!
//! bincode cannot drive `serde_json::Value`'s self-describing deserializer,
//! so persisted blobs travel as a JSON string inside the binary record.

use serde::{Deserialize, Deserializer, Serializer};

use super::Metadata;

pub fn serialize<S>(map: &Metadata, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let text = serde_json::to_string(map).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&text)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    serde_json::from_str(&text).map_err(serde::de::Error::custom)
}
