use std::sync::{Arc, Mutex, MutexGuard};

pub type RefreshListener = Arc<dyn Fn() + Send + Sync>;

/// Zero-argument callbacks fired by `Repository::refresh`.
#[derive(Default)]
pub struct RefreshListeners {
    listeners: Mutex<Vec<RefreshListener>>,
}

impl RefreshListeners {
    fn lock(&self) -> MutexGuard<'_, Vec<RefreshListener>> {
        // A listener that panicked does not invalidate the list itself.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, listener: RefreshListener) {
        self.lock().push(listener);
    }

    /// Removes every registration of this exact listener.
    pub fn remove(&self, listener: &RefreshListener) {
        self.lock().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self) {
        // Snapshot first so a listener may (un)subscribe without deadlocking.
        let listeners: Vec<RefreshListener> = self.lock().clone();
        for listener in listeners {
            listener();
        }
    }
}
