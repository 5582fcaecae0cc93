//! Observable REST entities on top of `restly-api`.
//!
//! An [`Entity`] holds a JSON resource representation as a tree of
//! observable cells, keeps it in sync with a server, and tracks local
//! edits against the last synchronized state:
//!
//! - **[`Observable<T>`]**: Shared reactive cell (`tokio::sync::watch`).
//!   Readers can [`get`](Observable::get), [`subscribe`](Observable::subscribe)
//!   or open an [`ObservableStream`]; only the owning entity writes.
//!
//! - **[`graph`]**: Plain JSON ⇄ observable tree conversion. Every nested
//!   object and array becomes its own [`Cell`], addressed with JSON
//!   pointers. Serialization drops the names on the [`IgnoreList`] at every
//!   depth and rejects cyclic structures.
//!
//! - **[`ChangeTracker`]**: Snapshot-based dirty detection and undo,
//!   publishing a [`DirtyState`] observable.
//!
//! - **[`Entity`]**: The façade: template reset, data replacement,
//!   `fetch` / `create` / `replace` / `remove` over HTTP, and the
//!   `is_updating` / `is_loaded` / `is_got` / `is_error` lifecycle flags.

pub mod config;
pub mod entity;
pub mod error;
pub mod graph;
pub mod observable;
pub mod stream;
pub mod tracker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{EntityConfig, TlsVerification};
pub use entity::{Callback, Entity, EntityStatus, SyncOutcome, Verb};
pub use error::CoreError;
pub use graph::{Cell, Composite, IgnoreList, Node};
pub use observable::{Flag, Observable, WeakObservable};
pub use stream::{ObservableStream, ObservableWatchStream};
pub use tracker::{ChangeTracker, DirtyState};
