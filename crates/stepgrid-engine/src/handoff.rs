use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use stepgrid_model::State;
use tracing::debug;

/// Whole-snapshot exchange of [`State`] between editors and the audio thread.
///
/// Editors clone the current snapshot, change the clone and publish it. The
/// audio thread loads the current snapshot once per block and never sees a
/// half-applied edit.
#[derive(Debug, Clone)]
pub struct StateHandle {
    current: Arc<ArcSwap<State>>,
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new(State::default())
    }
}

impl StateHandle {
    pub fn new(state: State) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(state)),
        }
    }

    /// Wait-free read for the audio thread.
    pub fn load(&self) -> Guard<Arc<State>> {
        self.current.load()
    }

    pub fn snapshot(&self) -> Arc<State> {
        self.current.load_full()
    }

    pub fn publish(&self, state: State) {
        debug!(patterns = state.num_patterns(), "publishing state snapshot");
        self.current.store(Arc::new(state));
    }

    /// Applies `edit` to a copy of the current snapshot and publishes it.
    pub fn update<R>(&self, edit: impl FnOnce(&mut State) -> R) -> R {
        let mut next = State::clone(&self.current.load());
        let result = edit(&mut next);
        self.publish(next);
        result
    }
}
