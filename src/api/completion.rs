use std::sync::mpsc::Sender;

use tracing::warn;

use crate::core::TargetId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Done,
    Failed(String),
}

/// Message delivered to the dashboard when an asynchronous view update ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub target: TargetId,
    pub run: u64,
    pub outcome: CompletionOutcome,
}

/// Signals the end of one asynchronous view update.
///
/// Obtained from [`ViewContext::defer_completion`](crate::api::ViewContext::defer_completion).
/// The handle is `Send`, so the work behind it may finish on another thread;
/// the dashboard picks the message up on its next flush or
/// `process_completions` call.
#[derive(Debug)]
#[must_use = "the view update stays in flight until the handle is completed"]
pub struct CompletionHandle {
    target: TargetId,
    run: u64,
    sender: Sender<Completion>,
}

impl CompletionHandle {
    pub(crate) fn new(target: TargetId, run: u64, sender: Sender<Completion>) -> Self {
        Self {
            target,
            run,
            sender,
        }
    }

    #[must_use]
    pub fn target(&self) -> TargetId {
        self.target
    }

    #[must_use]
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn complete(self) {
        self.send(CompletionOutcome::Done);
    }

    pub fn fail(self, message: impl Into<String>) {
        self.send(CompletionOutcome::Failed(message.into()));
    }

    fn send(self, outcome: CompletionOutcome) {
        let completion = Completion {
            target: self.target,
            run: self.run,
            outcome,
        };
        if self.sender.send(completion).is_err() {
            warn!(target = %self.target, run = self.run, "completion dropped: dashboard is gone");
        }
    }
}
