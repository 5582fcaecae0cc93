// ── Change tracking ──
//
// Snapshot-based dirty detection and undo for one observable tree.
// The tracker keeps only a weak handle to the tree it watches.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::graph::{self, Cell, IgnoreList, Node};
use crate::observable::{Observable, WeakObservable};

/// Whether tracked data differs from its baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirtyState {
    #[default]
    Clean,
    Dirty,
}

impl DirtyState {
    pub fn is_dirty(self) -> bool {
        self == Self::Dirty
    }
}

impl From<bool> for DirtyState {
    fn from(dirty: bool) -> Self {
        if dirty { Self::Dirty } else { Self::Clean }
    }
}

/// Dirty tracker attached to a single tree root.
///
/// At attach time the root is serialized into a baseline. Every check
/// re-serializes the root and compares against it; [`undo`](Self::undo)
/// restores the root's content from it. The result of each check is
/// published into an [`Observable<DirtyState>`] that subscribers can watch.
///
/// Tracking can be switched off with [`clean`](Self::clean): from then on
/// checks report clean until a new tracker is attached.
#[derive(Debug)]
pub struct ChangeTracker {
    root: WeakObservable<graph::Composite>,
    ignore: IgnoreList,
    baseline: String,
    latest: String,
    enabled: bool,
    state: Observable<DirtyState>,
}

impl ChangeTracker {
    /// Attach to `root`, publishing into an existing state cell.
    ///
    /// The cell is reset to [`DirtyState::Clean`], since the baseline is
    /// by definition the current state.
    pub(crate) fn attach_to(
        root: &Cell,
        ignore: IgnoreList,
        state: Observable<DirtyState>,
    ) -> Result<Self, CoreError> {
        let baseline = graph::cell_to_json(root, &ignore)?;
        state.replace_if_changed(DirtyState::Clean);
        debug!(bytes = baseline.len(), "change tracker attached");

        Ok(Self {
            root: root.downgrade(),
            ignore,
            latest: baseline.clone(),
            baseline,
            enabled: true,
            state,
        })
    }

    fn serialize_root(&self) -> Result<String, CoreError> {
        let root = self.root.upgrade().ok_or(CoreError::Detached)?;
        graph::cell_to_json(&root, &self.ignore)
    }

    /// Re-serialize the root and compare it with the baseline.
    ///
    /// Updates the latest snapshot but does not publish anything.
    pub fn check_changed(&mut self) -> Result<bool, CoreError> {
        self.latest = self.serialize_root()?;
        Ok(self.enabled && self.latest != self.baseline)
    }

    /// Check for changes and publish the result to subscribers.
    ///
    /// Subscribers are only woken when the state actually flips.
    pub fn has_changed(&mut self) -> Result<bool, CoreError> {
        let changed = self.check_changed()?;
        if self.state.replace_if_changed(DirtyState::from(changed)) {
            debug!(dirty = changed, "tracked data changed state");
        }
        Ok(changed)
    }

    /// Stop reporting changes and publish [`DirtyState::Clean`].
    pub fn clean(&mut self) {
        self.enabled = false;
        self.state.replace_if_changed(DirtyState::Clean);
    }

    /// Restore the root's content from the baseline.
    ///
    /// Returns `false` (and touches nothing) when the data already matches
    /// the baseline, so calling it repeatedly is harmless. Ignored fields are
    /// not part of the baseline and are dropped by a restore.
    pub fn undo(&mut self) -> Result<bool, CoreError> {
        let root = self.root.upgrade().ok_or(CoreError::Detached)?;
        self.latest = graph::cell_to_json(&root, &self.ignore)?;
        if self.latest == self.baseline {
            return Ok(false);
        }

        let restored = match graph::from_json(&self.baseline)? {
            Node::Observable(cell) => {
                graph::materialize_deep(&cell)?;
                cell.get()
            }
            Node::Leaf(_) => graph::Composite::empty_object(),
        };
        root.set(restored);
        self.latest.clone_from(&self.baseline);
        self.state.replace_if_changed(DirtyState::Clean);
        debug!("tracked data restored from baseline");
        Ok(true)
    }

    /// The reactive dirty state.
    pub fn state(&self) -> &Observable<DirtyState> {
        &self.state
    }

    /// The snapshot taken at attach time.
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// The snapshot taken at the last check.
    pub fn latest(&self) -> &str {
        &self.latest
    }

    /// `false` once [`clean`](Self::clean) has been called.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `true` if this tracker watches `cell`.
    pub fn tracks(&self, cell: &Cell) -> bool {
        self.root.upgrade().is_some_and(|root| root.ptr_eq(cell))
    }
}
