use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// Shared blocklist published as immutable snapshots.
///
/// The controller replaces the whole set on every mutation; the monitor
/// takes one snapshot per cycle and never observes a half-applied change.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    current: Arc<RwLock<Arc<BTreeSet<String>>>>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<BTreeSet<String>> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn publish<I>(&self, identifiers: I)
    where
        I: IntoIterator<Item = String>,
    {
        let next = Arc::new(identifiers.into_iter().collect::<BTreeSet<_>>());
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
