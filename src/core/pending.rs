use indexmap::IndexMap;

use crate::core::Pass;

/// Passes invalidated while their target was inactive.
///
/// Membership is unique by pass name; recording the same pass twice keeps a
/// single entry. Replay order follows first-recording order.
#[derive(Debug)]
pub struct PendingWorkSet<T> {
    passes: IndexMap<&'static str, Pass<T>>,
}

impl<T> Default for PendingWorkSet<T> {
    fn default() -> Self {
        Self {
            passes: IndexMap::new(),
        }
    }
}

impl<T> PendingWorkSet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pass. Returns `false` if it was already pending.
    pub fn record(&mut self, pass: Pass<T>) -> bool {
        if self.passes.contains_key(pass.name()) {
            return false;
        }
        self.passes.insert(pass.name(), pass);
        true
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.passes.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.keys().copied()
    }

    /// Empties the set and returns its passes for replay.
    pub fn take(&mut self) -> Vec<Pass<T>> {
        self.passes.drain(..).map(|(_, pass)| pass).collect()
    }

    pub fn clear(&mut self) {
        self.passes.clear();
    }
}
