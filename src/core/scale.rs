use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::TargetId;

/// Named numeric values one target contributes to a shared scale
/// (e.g. `max`, `min`, category counts).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaleValues(IndexMap<String, f64>);

impl ScaleValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(key, value)| (key.as_str(), *value))
    }
}

/// Recipients of a scale change, excluding the target that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScaleBroadcast {
    pub scale: String,
    pub recipients: Vec<TargetId>,
}

/// Value-mapping state shared by every target registered into it.
#[derive(Debug)]
pub struct Scale {
    name: String,
    registrants: IndexSet<TargetId>,
    contributions: IndexMap<TargetId, ScaleValues>,
    revision: u64,
}

pub type ScaleHandle = Rc<RefCell<Scale>>;

/// Scales a single target participates in, keyed by the name it knows them by.
pub type ScaleDictionary = IndexMap<String, ScaleHandle>;

impl Scale {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registrants: IndexSet::new(),
            contributions: IndexMap::new(),
            revision: 0,
        }
    }

    #[must_use]
    pub fn into_handle(self) -> ScaleHandle {
        Rc::new(RefCell::new(self))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Incremented on every change to the contributions.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn register(&mut self, target: TargetId) -> bool {
        self.registrants.insert(target)
    }

    #[must_use]
    pub fn is_registered(&self, target: TargetId) -> bool {
        self.registrants.contains(&target)
    }

    pub fn registrants(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.registrants.iter().copied()
    }

    /// Removes `target`. If it had contributed values, the remaining
    /// registrants are returned so they can re-render without them.
    pub(crate) fn unregister(&mut self, target: TargetId) -> ScaleBroadcast {
        let was_registered = self.registrants.shift_remove(&target);
        let had_values = self.contributions.shift_remove(&target).is_some();
        if !was_registered || !had_values {
            return self.broadcast_to(Vec::new());
        }
        self.revision += 1;
        let recipients = self.registrants.iter().copied().collect();
        trace!(scale = %self.name, %target, "scale contribution withdrawn");
        self.broadcast_to(recipients)
    }

    /// Stores `values` for `target` and returns every other registrant.
    ///
    /// The setter is registered if it was not already. Contributions are
    /// kept in write order, most recent last.
    pub(crate) fn set_values(&mut self, target: TargetId, values: ScaleValues) -> ScaleBroadcast {
        self.registrants.insert(target);
        self.contributions.shift_remove(&target);
        self.contributions.insert(target, values);
        self.revision += 1;
        let recipients: Vec<TargetId> = self
            .registrants
            .iter()
            .copied()
            .filter(|registrant| *registrant != target)
            .collect();
        trace!(
            scale = %self.name,
            %target,
            recipients = recipients.len(),
            "scale values broadcast"
        );
        self.broadcast_to(recipients)
    }

    #[must_use]
    pub fn values_for(&self, target: TargetId) -> Option<&ScaleValues> {
        self.contributions.get(&target)
    }

    /// Every contribution, oldest write first.
    pub fn contributions(&self) -> impl Iterator<Item = (TargetId, &ScaleValues)> {
        self.contributions
            .iter()
            .map(|(target, values)| (*target, values))
    }

    /// Values broadcast by every registrant except `reader`, merged key by
    /// key; the most recent writer wins.
    #[must_use]
    pub fn values_seen_by(&self, reader: TargetId) -> ScaleValues {
        let mut merged = ScaleValues::new();
        for (_, values) in self
            .contributions
            .iter()
            .filter(|(writer, _)| **writer != reader)
        {
            for (key, value) in values.iter() {
                merged.insert(key, value);
            }
        }
        merged
    }

    /// Smallest and largest value of `key` across all contributions.
    #[must_use]
    pub fn extent(&self, key: &str) -> Option<(f64, f64)> {
        self.contributions
            .values()
            .filter_map(|values| values.get(key))
            .filter(|value| value.is_finite())
            .fold(None, |extent, value| match extent {
                None => Some((value, value)),
                Some((min, max)) => Some((min.min(value), max.max(value))),
            })
    }

    fn broadcast_to(&self, recipients: Vec<TargetId>) -> ScaleBroadcast {
        ScaleBroadcast {
            scale: self.name.clone(),
            recipients,
        }
    }
}

/// Name → scale lookup shared by a dashboard.
///
/// Holds weak references only: the scale object lives as long as some
/// target's dictionary binds it.
#[derive(Debug, Default)]
pub struct ScaleRegistry {
    scales: IndexMap<String, Weak<RefCell<Scale>>>,
}

impl ScaleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live scale for `name`, creating it if none exists.
    pub fn scale(&mut self, name: &str) -> ScaleHandle {
        if let Some(handle) = self.get(name) {
            return handle;
        }
        let handle = Scale::new(name).into_handle();
        self.scales
            .insert(name.to_owned(), Rc::downgrade(&handle));
        handle
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ScaleHandle> {
        self.scales.get(name).and_then(Weak::upgrade)
    }

    /// Builds a dictionary binding each name to its shared scale.
    pub fn dictionary<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> ScaleDictionary {
        names
            .into_iter()
            .map(|name| (name.to_owned(), self.scale(name)))
            .collect()
    }

    /// Names of scales with at least one registered target.
    ///
    /// A scale every target withdrew from is not live even while a
    /// dictionary still binds it.
    #[must_use]
    pub fn live_scale_names(&self) -> Vec<String> {
        self.scales
            .iter()
            .filter(|(_, scale)| {
                scale
                    .upgrade()
                    .is_some_and(|scale| scale.borrow().registrants().next().is_some())
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Forgets names whose scale has been dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.scales.len();
        self.scales.retain(|_, scale| scale.strong_count() > 0);
        before - self.scales.len()
    }
}
