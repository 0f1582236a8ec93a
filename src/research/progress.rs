use crate::models::ResearchProgress;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// Listener end of the progress stream. Each message is an independent snapshot.
pub type ProgressReceiver = mpsc::UnboundedReceiver<ResearchProgress>;
pub type ProgressSender = mpsc::UnboundedSender<ResearchProgress>;

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Progress state of one recursion level. Mutations are published as cloned
/// snapshots; a closed or missing listener is ignored.
pub(crate) struct ProgressTracker {
    state: Mutex<ResearchProgress>,
    sink: Option<ProgressSender>,
}

impl ProgressTracker {
    pub(crate) fn new(initial: ResearchProgress, sink: Option<ProgressSender>) -> Self {
        Self {
            state: Mutex::new(initial),
            sink,
        }
    }

    pub(crate) fn update(&self, mutate: impl FnOnce(&mut ResearchProgress)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut state);
            state.clone()
        };
        if let Some(sink) = &self.sink {
            let _ = sink.send(snapshot);
        }
    }
}
