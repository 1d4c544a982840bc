//! Profile settings
//!
//! Per-user open mapping of namespaced keys. The bookshelf front end keeps
//! everything under one namespace:
//!
//! - `bookshelf.theme`, `bookshelf.avatar`
//! - `bookshelf.shelfOrder.<shelf id>`: ordering array of book ids
//! - `bookshelf.statusOrder.<status>`: ordering array of book ids

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShelfError};
use crate::wal::Operation;

use super::{json_blob, Metadata, ReadStatus, StateTables, UserId};

/// Namespace used for every key written through the profile endpoint
pub const PROFILE_NAMESPACE: &str = "bookshelf";

const SHELF_ORDER_PREFIX: &str = "shelfOrder.";
const STATUS_ORDER_PREFIX: &str = "statusOrder.";

/// Namespaced settings for one user
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileSettings {
    #[serde(with = "json_blob")]
    entries: Metadata,
}

impl ProfileSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `<namespace>.<key>`
    pub fn get(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.entries.get(&Self::full_key(namespace, key))
    }

    /// Set `<namespace>.<key>`, replacing any previous value
    pub fn set(&mut self, namespace: &str, key: &str, value: Value) {
        self.entries.insert(Self::full_key(namespace, key), value);
    }

    /// All keys of one namespace, with the namespace prefix stripped
    pub fn namespace(&self, namespace: &str) -> Metadata {
        let prefix = format!("{}.", namespace);
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|short| (short.to_string(), value.clone()))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{}.{}", namespace, key)
    }
}

/// Plan a settings merge for `user` from a JSON object payload
///
/// Ordering keys must name a collection that exists for this user: one of
/// their shelves, or a canonical status. Their value must be an array of
/// book ids.
pub fn plan_update(tables: &StateTables, user: UserId, payload: &Value) -> Result<Operation> {
    let fields = payload
        .as_object()
        .ok_or_else(|| ShelfError::validation("profile payload must be a JSON object"))?;

    let mut settings = tables.profile(user).cloned().unwrap_or_default();

    for (key, value) in fields {
        validate_key(tables, user, key, value)?;
        settings.set(PROFILE_NAMESPACE, key, value.clone());
    }

    Ok(Operation::PutProfile { user, settings })
}

/// Plan storing an avatar URL produced by the avatar store
pub fn plan_avatar(tables: &StateTables, user: UserId, url: &str) -> Operation {
    let mut settings = tables.profile(user).cloned().unwrap_or_default();
    settings.set(PROFILE_NAMESPACE, "avatar", Value::String(url.to_string()));
    Operation::PutProfile { user, settings }
}

fn validate_key(tables: &StateTables, user: UserId, key: &str, value: &Value) -> Result<()> {
    if key.trim().is_empty() {
        return Err(ShelfError::validation("profile keys must not be empty"));
    }

    if let Some(collection) = key.strip_prefix(SHELF_ORDER_PREFIX) {
        let owned = collection
            .parse::<u64>()
            .ok()
            .and_then(|id| tables.shelf(id))
            .is_some_and(|shelf| shelf.owner == user);
        if !owned {
            return Err(ShelfError::Validation(format!(
                "unknown collection name: shelf '{}'",
                collection
            )));
        }
        return validate_ordering(key, value);
    }

    if let Some(collection) = key.strip_prefix(STATUS_ORDER_PREFIX) {
        if ReadStatus::parse_strict(collection).is_none() {
            return Err(ShelfError::Validation(format!(
                "unknown collection name: status '{}'",
                collection
            )));
        }
        return validate_ordering(key, value);
    }

    Ok(())
}

fn validate_ordering(key: &str, value: &Value) -> Result<()> {
    let valid = value
        .as_array()
        .is_some_and(|ids| ids.iter().all(|id| id.as_u64().is_some()));
    if valid {
        Ok(())
    } else {
        Err(ShelfError::Validation(format!(
            "'{}' must be an array of book ids",
            key
        )))
    }
}
