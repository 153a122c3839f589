use std::sync::{Arc, Mutex, PoisonError};

/// Append-only list of matched triggers shared by both stream scanners.
#[derive(Clone, Default)]
pub(crate) struct FoundTriggers {
    inner: Arc<Mutex<Vec<String>>>,
}

impl FoundTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, trigger: &str) {
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        g.push(trigger.to_string());
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Move the collected triggers out, leaving the list empty.
    pub fn take(&self) -> Vec<String> {
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *g)
    }
}
