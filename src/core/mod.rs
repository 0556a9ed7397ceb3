pub mod pass;
pub mod pending;
pub mod scale;
pub mod scheduler;
pub mod types;

pub use pass::{Pass, PassKey, PassMethod, PassMode, Priority};
pub use pending::PendingWorkSet;
pub use scale::{Scale, ScaleBroadcast, ScaleDictionary, ScaleHandle, ScaleRegistry, ScaleValues};
pub use scheduler::{
    DEFAULT_MAX_PASSES_PER_FLUSH, ExecutedPass, FlushReport, Invalidation, PassContext,
    Schedulable, Scheduler, TargetStore,
};
pub use types::{ContainerSize, SourceId, TargetId};
