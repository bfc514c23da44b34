//! Registry wrapper for hosts that load batches from more than one thread.
//!
//! `register` performs a read-modify-write per group, so every access goes
//! through one mutex. Once loading is done, `freeze` hands out the registry as
//! an immutable `Arc` and readers no longer contend.

use crate::catalog::identity::GroupKey;
use crate::catalog::model::{Batch, Fact};
use crate::catalog::registry::ImplRegistry;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<ImplRegistry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, batch: &Batch) {
        self.inner.lock().register(batch);
    }

    /// Owned copy of the facts for `key`; empty when unknown.
    pub fn query(&self, key: &GroupKey) -> Vec<Fact> {
        self.inner.lock().query(key).to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// End the loading phase and return a read-only registry.
    ///
    /// Clones the registry when other handles are still alive.
    pub fn freeze(self) -> Arc<ImplRegistry> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Arc::new(mutex.into_inner()),
            Err(shared) => {
                let registry = shared.lock().clone();
                Arc::new(registry)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::fixtures::{batch, fact};
    use std::thread;

    #[test]
    fn concurrent_registration_keeps_every_fact() {
        let shared = SharedRegistry::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for j in 0..25 {
                        let name = format!("T{i}_{j}");
                        shared.register(&batch("lib::Tr", vec![fact("libA", &name, "lib::Tr")]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.query(&GroupKey::new("libA")).len(), 100);
        let frozen = shared.freeze();
        assert_eq!(frozen.len(), 100);
        assert_eq!(frozen.receipts().len(), 100);
    }

    #[test]
    fn per_thread_order_is_preserved() {
        let shared = SharedRegistry::new();
        let worker = {
            let shared = shared.clone();
            thread::spawn(move || {
                for name in ["a", "b", "c"] {
                    shared.register(&batch("lib::Tr", vec![fact("libW", name, "lib::Tr")]));
                }
            })
        };
        worker.join().unwrap();

        let names: Vec<String> = shared
            .query(&GroupKey::new("libW"))
            .into_iter()
            .map(|f| f.entity.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
