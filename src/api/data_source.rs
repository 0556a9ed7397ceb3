use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::core::SourceId;

/// External producer of result payloads.
///
/// Change notifications are delivered by the host through
/// [`Dashboard::notify_results_changed`](crate::api::Dashboard::notify_results_changed).
pub trait DataSource {
    fn id(&self) -> SourceId;
    fn current_results(&self) -> Value;
}

/// In-process data source whose results can be replaced by the host.
///
/// Clones share the same payload.
#[derive(Clone)]
pub struct SharedDataSource {
    id: SourceId,
    results: Rc<RefCell<Value>>,
}

impl SharedDataSource {
    #[must_use]
    pub fn new(id: SourceId, results: Value) -> Self {
        Self {
            id,
            results: Rc::new(RefCell::new(results)),
        }
    }

    pub fn set_results(&self, results: Value) {
        *self.results.borrow_mut() = results;
    }

    #[must_use]
    pub fn into_source(self) -> Rc<dyn DataSource> {
        Rc::new(self)
    }
}

impl fmt::Debug for SharedDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDataSource")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl DataSource for SharedDataSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn current_results(&self) -> Value {
        self.results.borrow().clone()
    }
}
