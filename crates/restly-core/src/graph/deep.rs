// Recursive observabilization: wrap every nested plain composite in its
// own cell so each level of the tree can be subscribed to on its own.

use serde_json::Value;

use super::{Cell, Composite, Node, materialize, pointer};
use crate::error::CoreError;

/// Make every composite reachable from `root` an observable cell.
///
/// Plain composites (`Leaf(object|array)`) are replaced in place by a new
/// cell and then descended into. Existing cells are kept as they are and
/// descended into. A cell is only notified when one of its own fields was
/// replaced. A cell that reappears on the current descent path is a cycle
/// and fails with [`CoreError::Cyclic`].
pub(crate) fn materialize_deep(root: &Cell) -> Result<(), CoreError> {
    Walk::default().cell(root)
}

/// Materialize `value` and make the whole tree observable.
///
/// Primitive input has no fields to hold, so it yields an empty object.
pub fn materialize_tree(value: &Value) -> Result<Cell, CoreError> {
    match materialize(value) {
        Node::Observable(cell) => {
            materialize_deep(&cell)?;
            Ok(cell)
        }
        Node::Leaf(_) => Ok(Cell::new(Composite::empty_object())),
    }
}

/// `true` if no plain composite remains anywhere under `node`.
///
/// A cyclic tree is never fully observable.
pub fn is_fully_observable(node: &Node) -> bool {
    fn check(node: &Node, stack: &mut Vec<usize>) -> bool {
        match node {
            Node::Leaf(value) => !(value.is_object() || value.is_array()),
            Node::Observable(cell) => {
                if stack.contains(&cell.addr()) {
                    return false;
                }
                stack.push(cell.addr());
                let ok = cell.with(|c| c.nodes().all(|child| check(child, stack)));
                stack.pop();
                ok
            }
        }
    }
    check(node, &mut Vec::new())
}

#[derive(Default)]
struct Walk {
    stack: Vec<usize>,
    tokens: Vec<String>,
}

impl Walk {
    fn cell(&mut self, cell: &Cell) -> Result<(), CoreError> {
        let addr = cell.addr();
        if self.stack.contains(&addr) {
            return Err(CoreError::Cyclic {
                pointer: pointer::render(&self.tokens),
            });
        }

        // Wrap this level, then release the lock before descending.
        cell.modify(|composite| {
            composite
                .nodes_mut()
                .fold(false, |wrapped, node| wrap_plain(node) || wrapped)
        });
        let children = cell.with(Composite::child_cells);

        self.stack.push(addr);
        for (token, child) in children {
            self.tokens.push(token);
            let result = self.cell(&child);
            self.tokens.pop();
            if let Err(e) = result {
                self.stack.pop();
                return Err(e);
            }
        }
        self.stack.pop();
        Ok(())
    }
}

fn wrap_plain(node: &mut Node) -> bool {
    let Node::Leaf(value) = node else {
        return false;
    };
    match Composite::shallow(value) {
        Some(composite) => {
            *node = Node::Observable(Cell::new(composite));
            true
        }
        None => false,
    }
}
