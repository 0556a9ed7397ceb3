use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ConfigAttributes = IndexMap<String, Value>;

/// Attribute store a target renders from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigState {
    attributes: ConfigAttributes,
}

/// Notification payload for a config mutation.
///
/// `changed` holds the new value of every attribute that changed (`Null`
/// for removed ones); `previous` is the full attribute set before the change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigChange {
    pub changed: ConfigAttributes,
    pub previous: ConfigAttributes,
}

impl ConfigChange {
    pub fn changed_keys(&self) -> impl Iterator<Item = &str> {
        self.changed.keys().map(String::as_str)
    }

    #[must_use]
    pub fn touches(&self, key: &str) -> bool {
        self.changed.contains_key(key)
    }

    #[must_use]
    pub fn previous_value(&self, key: &str) -> Option<&Value> {
        self.previous.get(key)
    }
}

impl ConfigState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_attributes(attributes: ConfigAttributes) -> Self {
        Self { attributes }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    #[must_use]
    pub fn attributes(&self) -> &ConfigAttributes {
        &self.attributes
    }

    #[must_use]
    pub fn snapshot(&self) -> ConfigAttributes {
        self.attributes.clone()
    }

    /// Sets one attribute. Returns `None` when the value is unchanged.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<ConfigChange> {
        let mut attributes = ConfigAttributes::new();
        attributes.insert(key.into(), value);
        self.set_many(attributes)
    }

    /// Applies several attributes as one change.
    pub fn set_many(&mut self, attributes: ConfigAttributes) -> Option<ConfigChange> {
        let previous = self.attributes.clone();
        let mut changed = ConfigAttributes::new();
        for (key, value) in attributes {
            if self.attributes.get(&key) == Some(&value) {
                continue;
            }
            self.attributes.insert(key.clone(), value.clone());
            changed.insert(key, value);
        }
        if changed.is_empty() {
            return None;
        }
        Some(ConfigChange { changed, previous })
    }

    pub fn unset(&mut self, key: &str) -> Option<ConfigChange> {
        if !self.attributes.contains_key(key) {
            return None;
        }
        let previous = self.attributes.clone();
        self.attributes.shift_remove(key);
        let mut changed = ConfigAttributes::new();
        changed.insert(key.to_owned(), Value::Null);
        Some(ConfigChange { changed, previous })
    }
}
