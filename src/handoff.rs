//! Delivery of batches to their consumer.
//!
//! Initialization is two-phase: the consumer (a `BatchSink`) is constructed
//! first and attached to a `Loader`, and only then can batches flow. Because a
//! `Loader` cannot exist without its sink, a batch never arrives before its
//! consumer and there is nothing to buffer.

use crate::catalog::{Batch, ImplRegistry, SharedRegistry, TraitPath};
use crate::implementors::{self, ParseMode};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Consumer of loaded batches.
pub trait BatchSink {
    fn accept(&mut self, batch: &Batch) -> Result<()>;
}

impl BatchSink for ImplRegistry {
    fn accept(&mut self, batch: &Batch) -> Result<()> {
        self.register(batch);
        Ok(())
    }
}

impl BatchSink for SharedRegistry {
    fn accept(&mut self, batch: &Batch) -> Result<()> {
        self.register(batch);
        Ok(())
    }
}

impl<S: BatchSink + ?Sized> BatchSink for &mut S {
    fn accept(&mut self, batch: &Batch) -> Result<()> {
        (**self).accept(batch)
    }
}

/// Lifecycle of one batch. `Delivered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Unregistered,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    pub trait_path: TraitPath,
    pub state: DeliveryState,
    pub facts: usize,
}

/// Feeds batches to an attached sink, in call order.
pub struct Loader<S: BatchSink> {
    sink: S,
    mode: ParseMode,
    log: Vec<DeliveryRecord>,
}

impl<S: BatchSink> Loader<S> {
    /// Attach the consumer. No batch can be delivered before this point.
    pub fn attach(sink: S) -> Self {
        Self {
            sink,
            mode: ParseMode::default(),
            log: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Hand one batch to the sink synchronously.
    ///
    /// A sink error leaves the batch `Unregistered` in the log and is
    /// returned to the caller.
    pub fn deliver(&mut self, batch: &Batch) -> Result<DeliveryState> {
        let outcome = self.sink.accept(batch);
        let state = if outcome.is_ok() {
            DeliveryState::Delivered
        } else {
            DeliveryState::Unregistered
        };
        self.log.push(DeliveryRecord {
            trait_path: batch.trait_path.clone(),
            state,
            facts: batch.fact_count(),
        });
        outcome.map(|()| state)
    }

    /// Parse one implementor file under `root` and deliver it.
    pub fn deliver_file(&mut self, root: &Path, file: &Path) -> Result<DeliveryState> {
        let batch = implementors::load_batch(root, file, self.mode)?;
        debug!(file = %file.display(), trait_path = %batch.trait_path, "delivering batch");
        self.deliver(&batch)
    }

    /// Deliver every implementor file under `root` in sorted path order.
    ///
    /// Returns the number of batches delivered.
    pub fn deliver_tree(&mut self, root: &Path) -> Result<usize> {
        let files = implementors::collect_implementor_files(root)?;
        for file in &files {
            self.deliver_file(root, file)?;
        }
        info!(root = %root.display(), batches = files.len(), "loaded implementor tree");
        Ok(files.len())
    }

    /// Delivery log in call order.
    pub fn states(&self) -> &[DeliveryRecord] {
        &self.log
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// End loading and give the sink back to the caller.
    pub fn finish(self) -> S {
        self.sink
    }
}
