//! Implementor catalog wiring.
//!
//! Types here describe the facts decoded from rustdoc implementor tables.
//! Callers build `Batch`es (usually via `implementors::load_batch`), merge them
//! into an `ImplRegistry`, and query by owning crate. `SharedRegistry` wraps
//! the same store for multi-threaded loading.

pub mod identity;
pub mod model;
pub mod registry;
pub mod shared;

pub use identity::{GroupKey, ItemKind, TraitPath};
pub use model::{Batch, EntityRef, Fact, TraitRef};
pub use registry::{BatchReceipt, ImplRegistry};
pub use shared::SharedRegistry;
