// JSON Pointer (RFC 6901) addressing into observable trees.

use serde_json::Value;

use super::{Cell, Composite, IgnoreList, Node, array_index, materialize_tree, to_value};
use crate::error::CoreError;

/// Split a pointer into unescaped reference tokens. `""` is the root.
pub(crate) fn parse(pointer: &str) -> Result<Vec<String>, CoreError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(CoreError::invalid_pointer(pointer, "must start with '/'"));
    };
    Ok(rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Inverse of [`parse`].
pub(crate) fn render(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| format!("/{}", t.replace('~', "~0").replace('/', "~1")))
        .collect()
}

/// Walk down through observable children. `Ok(None)` if a step is missing.
fn descend(root: &Cell, tokens: &[String], pointer: &str) -> Result<Option<Cell>, CoreError> {
    let mut cell = root.clone();
    for token in tokens {
        let next = cell.with(|c| c.child(token).cloned());
        match next {
            Some(Node::Observable(child)) => cell = child,
            Some(Node::Leaf(_)) => {
                return Err(CoreError::invalid_pointer(
                    pointer,
                    format!("{token:?} is not an observable container"),
                ));
            }
            None => return Ok(None),
        }
    }
    Ok(Some(cell))
}

/// The cell addressed by `pointer`, for subscribing to one nested composite.
pub fn cell_at(root: &Cell, pointer: &str) -> Result<Option<Cell>, CoreError> {
    let tokens = parse(pointer)?;
    match descend(root, &tokens, pointer) {
        Ok(found) => Ok(found),
        // A leaf on the way just means nothing observable lives there.
        Err(CoreError::InvalidPointer { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// The plain value at `pointer`, with nothing ignored.
pub fn value_at(root: &Cell, pointer: &str) -> Result<Option<Value>, CoreError> {
    let tokens = parse(pointer)?;
    let Some((last, parents)) = tokens.split_last() else {
        return to_value(&Node::Observable(root.clone()), &IgnoreList::none()).map(Some);
    };
    let Some(parent) = descend(root, parents, pointer)? else {
        return Ok(None);
    };
    match parent.with(|c| c.child(last).cloned()) {
        Some(node) => to_value(&node, &IgnoreList::none()).map(Some),
        None => Ok(None),
    }
}

/// Write `value` at `pointer`.
///
/// Composite values are deep-materialized first, so the tree stays fully
/// observable. Missing object keys are inserted; `-` (or the current
/// length) appends to an array. Writing the root replaces the root cell's
/// content and requires an object or array.
pub(crate) fn set_at(root: &Cell, pointer: &str, value: &Value) -> Result<(), CoreError> {
    let tokens = parse(pointer)?;
    let Some((last, parents)) = tokens.split_last() else {
        if !(value.is_object() || value.is_array()) {
            return Err(CoreError::invalid_pointer(
                pointer,
                "the root must be an object or array",
            ));
        }
        let fresh = materialize_tree(value)?;
        root.set(fresh.get());
        return Ok(());
    };

    let parent = descend(root, parents, pointer)?
        .ok_or_else(|| CoreError::invalid_pointer(pointer, "parent does not exist"))?;

    let node = if value.is_object() || value.is_array() {
        Node::Observable(materialize_tree(value)?)
    } else {
        Node::Leaf(value.clone())
    };

    let mut outcome = Ok(());
    parent.modify(|c| match put(c, last, node) {
        Ok(()) => true,
        Err(reason) => {
            outcome = Err(CoreError::invalid_pointer(pointer, reason));
            false
        }
    });
    outcome
}

/// Remove and return the value at `pointer`.
pub(crate) fn remove_at(root: &Cell, pointer: &str) -> Result<Option<Value>, CoreError> {
    let tokens = parse(pointer)?;
    let Some((last, parents)) = tokens.split_last() else {
        return Err(CoreError::invalid_pointer(pointer, "cannot remove the root"));
    };
    let Some(parent) = descend(root, parents, pointer)? else {
        return Ok(None);
    };

    let mut removed = None;
    parent.modify(|c| {
        removed = take(c, last);
        removed.is_some()
    });

    removed
        .map(|node| to_value(&node, &IgnoreList::none()))
        .transpose()
}

fn put(composite: &mut Composite, token: &str, node: Node) -> Result<(), String> {
    match composite {
        Composite::Object(map) => {
            map.insert(token.to_owned(), node);
            Ok(())
        }
        Composite::Array(items) => {
            if token == "-" {
                items.push(node);
                return Ok(());
            }
            let index =
                array_index(token).ok_or_else(|| format!("{token:?} is not an array index"))?;
            match index.cmp(&items.len()) {
                std::cmp::Ordering::Less => {
                    if let Some(slot) = items.get_mut(index) {
                        *slot = node;
                    }
                    Ok(())
                }
                std::cmp::Ordering::Equal => {
                    items.push(node);
                    Ok(())
                }
                std::cmp::Ordering::Greater => Err(format!(
                    "index {index} out of bounds (len {})",
                    items.len()
                )),
            }
        }
    }
}

fn take(composite: &mut Composite, token: &str) -> Option<Node> {
    match composite {
        Composite::Object(map) => map.shift_remove(token),
        Composite::Array(items) => {
            let index = array_index(token)?;
            (index < items.len()).then(|| items.remove(index))
        }
    }
}
