// ── Observable value graph ──
//
// Conversion between plain `serde_json::Value` trees and observable
// trees, and serialization back to JSON. A tree node is either a leaf
// value or an observable cell holding an object or array of nodes.

mod deep;
mod pointer;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::observable::Observable;

pub use deep::{is_fully_observable, materialize_tree};
pub use pointer::{cell_at, value_at};

// Writers into an existing tree stay inside the crate: every write goes
// through `Entity`, which re-evaluates the dirty state afterwards.
pub(crate) use deep::materialize_deep;
pub(crate) use pointer::{remove_at, set_at};

/// An observable composite: the unit of individual subscription.
pub type Cell = Observable<Composite>;

/// Key reserved for mapping bookkeeping; never part of the wire form.
pub const BOOKKEEPING_KEY: &str = "__mapping__";

/// Field names excluded from serialization unless configured otherwise.
pub const DEFAULT_IGNORED: [&str; 5] = [
    "isUpdating",
    "isLoaded",
    "isGot",
    "isError",
    BOOKKEEPING_KEY,
];

// ── Tree types ───────────────────────────────────────────────────────

/// A node of an observable tree.
///
/// `Leaf` normally holds a primitive. A `Leaf` holding an object or array
/// is a plain composite that has not been made observable yet;
/// [`materialize_tree`] never leaves one behind.
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(Value),
    Observable(Cell),
}

/// The content of a cell.
#[derive(Debug, Clone)]
pub enum Composite {
    Object(IndexMap<String, Node>),
    Array(Vec<Node>),
}

impl Node {
    /// The cell behind this node, if it is observable.
    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Self::Observable(cell) => Some(cell),
            Self::Leaf(_) => None,
        }
    }

    /// `true` for a leaf holding an object or array.
    pub fn is_plain_composite(&self) -> bool {
        matches!(self, Self::Leaf(Value::Object(_) | Value::Array(_)))
    }
}

impl Composite {
    pub fn empty_object() -> Self {
        Self::Object(IndexMap::new())
    }

    /// One level of materialization: a composite whose children are all
    /// leaves. Returns `None` for primitives.
    pub fn shallow(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Node::Leaf(v.clone())))
                    .collect(),
            )),
            Value::Array(items) => Some(Self::Array(
                items.iter().cloned().map(Node::Leaf).collect(),
            )),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Object(map) => map.len(),
            Self::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Child addressed by an object key or an array index.
    pub fn child(&self, token: &str) -> Option<&Node> {
        match self {
            Self::Object(map) => map.get(token),
            Self::Array(items) => array_index(token).and_then(|i| items.get(i)),
        }
    }

    /// All children in order.
    pub fn nodes(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
        match self {
            Self::Object(map) => Box::new(map.values()),
            Self::Array(items) => Box::new(items.iter()),
        }
    }

    pub(crate) fn nodes_mut(&mut self) -> Box<dyn Iterator<Item = &mut Node> + '_> {
        match self {
            Self::Object(map) => Box::new(map.values_mut()),
            Self::Array(items) => Box::new(items.iter_mut()),
        }
    }

    /// Observable children with the token that addresses each of them.
    pub(crate) fn child_cells(&self) -> Vec<(String, Cell)> {
        match self {
            Self::Object(map) => map
                .iter()
                .filter_map(|(k, n)| n.as_cell().map(|c| (k.clone(), c.clone())))
                .collect(),
            Self::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, n)| n.as_cell().map(|c| (i.to_string(), c.clone())))
                .collect(),
        }
    }
}

/// An array index token: `0`, or digits without a leading zero or sign.
pub(crate) fn array_index(token: &str) -> Option<usize> {
    let digits = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
    if digits && (token == "0" || !token.starts_with('0')) {
        token.parse().ok()
    } else {
        None
    }
}

// ── Ignore list ──────────────────────────────────────────────────────

/// Field names dropped from every object, at every depth, on serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList {
    names: Arc<[String]>,
}

impl IgnoreList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// An empty list: serialize everything.
    pub fn none() -> Self {
        Self::new(std::iter::empty::<String>())
    }

    /// A copy of this list with `name` added.
    pub fn with(&self, name: impl Into<String>) -> Self {
        Self::new(self.names.iter().cloned().chain(std::iter::once(name.into())))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED)
    }
}

// ── Materialization ──────────────────────────────────────────────────

/// Convert a plain value into a node, one level deep.
///
/// Objects and arrays become a cell whose children are leaves; nested
/// composites stay plain. [`materialize_tree`] wraps every level.
pub fn materialize(value: &Value) -> Node {
    match Composite::shallow(value) {
        Some(composite) => Node::Observable(Cell::new(composite)),
        None => Node::Leaf(value.clone()),
    }
}

/// Parse JSON and materialize it.
pub fn from_json(json: &str) -> Result<Node, CoreError> {
    let value: Value = serde_json::from_str(json)?;
    Ok(materialize(&value))
}

// ── Serialization ────────────────────────────────────────────────────

/// Convert a node back into a plain value, dropping ignored fields.
pub fn to_value(node: &Node, ignore: &IgnoreList) -> Result<Value, CoreError> {
    Serializer::new(ignore).node(node)
}

/// Serialize a node to a compact JSON string, dropping ignored fields.
pub fn to_json(node: &Node, ignore: &IgnoreList) -> Result<String, CoreError> {
    Ok(serde_json::to_string(&to_value(node, ignore)?)?)
}

/// Serialize the content of a cell.
pub fn cell_to_json(cell: &Cell, ignore: &IgnoreList) -> Result<String, CoreError> {
    to_json(&Node::Observable(cell.clone()), ignore)
}

struct Serializer<'a> {
    ignore: &'a IgnoreList,
    /// Cells on the current descent path, by address.
    stack: Vec<usize>,
    tokens: Vec<String>,
}

impl<'a> Serializer<'a> {
    fn new(ignore: &'a IgnoreList) -> Self {
        Self {
            ignore,
            stack: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn node(&mut self, node: &Node) -> Result<Value, CoreError> {
        match node {
            Node::Leaf(value) => Ok(self.plain(value)),
            Node::Observable(cell) => self.cell(cell),
        }
    }

    fn cell(&mut self, cell: &Cell) -> Result<Value, CoreError> {
        let addr = cell.addr();
        if self.stack.contains(&addr) {
            return Err(CoreError::Cyclic {
                pointer: pointer::render(&self.tokens),
            });
        }
        self.stack.push(addr);
        let out = cell.with(|composite| self.composite(composite));
        self.stack.pop();
        out
    }

    fn composite(&mut self, composite: &Composite) -> Result<Value, CoreError> {
        match composite {
            Composite::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    if self.ignore.contains(key) {
                        continue;
                    }
                    self.tokens.push(key.clone());
                    let value = self.node(child);
                    self.tokens.pop();
                    out.insert(key.clone(), value?);
                }
                Ok(Value::Object(out))
            }
            Composite::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, child) in items.iter().enumerate() {
                    self.tokens.push(i.to_string());
                    let value = self.node(child);
                    self.tokens.pop();
                    out.push(value?);
                }
                Ok(Value::Array(out))
            }
        }
    }

    fn plain(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| !self.ignore.contains(k))
                    .map(|(k, v)| (k.clone(), self.plain(v)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.plain(v)).collect()),
            other => other.clone(),
        }
    }
}
