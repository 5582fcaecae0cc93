// ── Entity ──
//
// Observable data bound to a REST resource. Owns the data tree, its
// change tracker and the lifecycle flags; the network verbs live in
// `sync.rs`.

mod sync;

use serde::Serialize;
use serde_json::{Map, Value};

use restly_api::RestClient;

use crate::config::EntityConfig;
use crate::error::CoreError;
use crate::graph::{self, Cell, Composite};
use crate::observable::{Flag, Observable};
use crate::tracker::{ChangeTracker, DirtyState};

pub use sync::{Callback, SyncOutcome, Verb};

/// Point-in-time copy of an entity's lifecycle flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatus {
    pub is_updating: bool,
    pub is_loaded: bool,
    pub is_got: bool,
    pub is_error: bool,
}

/// An observable resource representation kept in sync with a server.
///
/// The data root is a single [`Cell`] whose identity never changes:
/// replacing the data (from a template, a response or an undo) swaps the
/// cell's content, so subscriptions to the root survive every update.
/// Nested composites are cells too and can be watched individually via
/// [`cell_at`](Self::cell_at).
///
/// All mutation goes through `&mut self`; an entity never has two requests
/// in flight.
#[derive(Debug)]
pub struct Entity {
    client: RestClient,
    config: EntityConfig,
    data_model: Option<Value>,
    data: Cell,
    tracker: ChangeTracker,
    dirty: Observable<DirtyState>,
    is_updating: Flag,
    is_loaded: Flag,
    is_got: Flag,
    is_error: Flag,
}

impl Entity {
    /// Create an entity, building its HTTP client from `config`.
    ///
    /// `data_model` is the template [`new_entity`](Self::new_entity) resets
    /// to. The entity starts with an empty object and every flag down.
    pub fn new(config: EntityConfig, data_model: Option<Value>) -> Result<Self, CoreError> {
        let client = RestClient::new(config.base_url.clone(), &config.transport())?;
        Self::with_client(client, config, data_model)
    }

    /// Create an entity around an existing client.
    pub fn with_client(
        client: RestClient,
        config: EntityConfig,
        data_model: Option<Value>,
    ) -> Result<Self, CoreError> {
        let data = Cell::new(Composite::empty_object());
        let dirty = Observable::new(DirtyState::Clean);
        let tracker = ChangeTracker::attach_to(&data, config.ignore.clone(), dirty.clone())?;

        Ok(Self {
            client,
            config,
            data_model,
            data,
            tracker,
            dirty,
            is_updating: Flag::new(false),
            is_loaded: Flag::new(false),
            is_got: Flag::new(false),
            is_error: Flag::new(false),
        })
    }

    // ── Data ─────────────────────────────────────────────────────────

    /// Reset the data to the template (or an empty object) and mark the
    /// entity as not loaded.
    pub fn new_entity(&mut self) -> Result<(), CoreError> {
        let model = self
            .data_model
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        self.set_data(&model)?;
        self.is_loaded.replace_if_changed(false);
        Ok(())
    }

    /// Replace the data with an observable copy of `plain` and start
    /// tracking changes from there.
    pub fn set_data(&mut self, plain: &Value) -> Result<(), CoreError> {
        let fresh = graph::materialize_tree(plain)?;
        self.data.set(fresh.get());
        self.tracker =
            ChangeTracker::attach_to(&self.data, self.config.ignore.clone(), self.dirty.clone())?;
        self.is_loaded.replace_if_changed(true);
        Ok(())
    }

    /// [`set_data`](Self::set_data) from a JSON string.
    pub fn set_json(&mut self, json: &str) -> Result<(), CoreError> {
        let plain: Value = serde_json::from_str(json)?;
        self.set_data(&plain)
    }

    /// The wire representation of the data, without ignored fields.
    pub fn to_json(&self) -> Result<String, CoreError> {
        graph::cell_to_json(&self.data, &self.config.ignore)
    }

    /// The data as a plain value, without ignored fields.
    pub fn to_value(&self) -> Result<Value, CoreError> {
        graph::to_value(&graph::Node::Observable(self.data.clone()), &self.config.ignore)
    }

    /// The data root, for reading and subscribing.
    ///
    /// Writes go through [`set_at`](Self::set_at) and
    /// [`remove_at`](Self::remove_at); the tree cannot be edited from
    /// outside the entity:
    ///
    /// ```compile_fail
    /// use restly_core::{Entity, EntityConfig};
    ///
    /// let entity = Entity::new(EntityConfig::default(), None)?;
    /// restly_core::graph::set_at(entity.data(), "/n", &serde_json::json!(2))?;
    /// # Ok::<(), restly_core::CoreError>(())
    /// ```
    pub fn data(&self) -> &Cell {
        &self.data
    }

    pub fn data_model(&self) -> Option<&Value> {
        self.data_model.as_ref()
    }

    /// The plain value at a JSON pointer (`""` is the whole document).
    pub fn value_at(&self, pointer: &str) -> Result<Option<Value>, CoreError> {
        graph::value_at(&self.data, pointer)
    }

    /// The cell of the composite at a JSON pointer.
    pub fn cell_at(&self, pointer: &str) -> Result<Option<Cell>, CoreError> {
        graph::cell_at(&self.data, pointer)
    }

    /// Write a value at a JSON pointer and re-evaluate the dirty state.
    pub fn set_at(&mut self, pointer: &str, value: &Value) -> Result<DirtyState, CoreError> {
        graph::set_at(&self.data, pointer, value)?;
        self.refresh()
    }

    /// Remove the value at a JSON pointer and re-evaluate the dirty state.
    pub fn remove_at(&mut self, pointer: &str) -> Result<Option<Value>, CoreError> {
        let removed = graph::remove_at(&self.data, pointer)?;
        self.refresh()?;
        Ok(removed)
    }

    fn refresh(&mut self) -> Result<DirtyState, CoreError> {
        self.tracker.has_changed().map(DirtyState::from)
    }

    // ── Change tracking ──────────────────────────────────────────────

    /// `true` if the data differs from the last synchronized state.
    pub fn has_changed(&mut self) -> Result<bool, CoreError> {
        self.tracker.has_changed()
    }

    /// Revert the data to the last synchronized state.
    pub fn undo(&mut self) -> Result<bool, CoreError> {
        self.tracker.undo()
    }

    /// Stop reporting changes until the next synchronization.
    pub fn clean(&mut self) {
        self.tracker.clean();
    }

    /// The reactive dirty state. Stable across synchronizations.
    pub fn dirty_state(&self) -> &Observable<DirtyState> {
        &self.dirty
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    // ── Lifecycle flags ──────────────────────────────────────────────

    /// A request is in flight.
    pub fn is_updating(&self) -> &Flag {
        &self.is_updating
    }

    /// Data has been set, from the template or the network.
    pub fn is_loaded(&self) -> &Flag {
        &self.is_loaded
    }

    /// At least one server response has been applied.
    pub fn is_got(&self) -> &Flag {
        &self.is_got
    }

    /// The most recent request failed.
    pub fn is_error(&self) -> &Flag {
        &self.is_error
    }

    pub fn status(&self) -> EntityStatus {
        EntityStatus {
            is_updating: self.is_updating.get(),
            is_loaded: self.is_loaded.get(),
            is_got: self.is_got.get(),
            is_error: self.is_error.get(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }
}
