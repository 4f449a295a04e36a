//! Flat per-function symbol table mapping locals to frame offsets.
//!
//! Bindings are kept as a stack: registering never checks for duplicates and
//! lookups scan newest first, so a redeclared name resolves to its latest
//! slot.

use crate::ast::{Node, NodeList};

/// Bytes per local variable slot.
pub const SLOT_SIZE: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
  pub name: String,
  /// Signed distance from `%ebp`; always negative for locals.
  pub offset: i32,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
  bindings: Vec<Symbol>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, name: impl Into<String>, offset: i32) {
    self.bindings.push(Symbol {
      name: name.into(),
      offset,
    });
  }

  pub fn lookup(&self, name: &str) -> Option<i32> {
    self
      .bindings
      .iter()
      .rev()
      .find(|symbol| symbol.name == name)
      .map(|symbol| symbol.offset)
  }

  pub fn clear(&mut self) {
    self.bindings.clear();
  }

  pub fn len(&self) -> usize {
    self.bindings.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bindings.is_empty()
  }

  /// Assign one slot per declaration in source order, starting at
  /// `-SLOT_SIZE` and growing downwards. Returns the frame size to reserve.
  pub fn assign_offsets(&mut self, declarations: &NodeList) -> i32 {
    let mut offset = -SLOT_SIZE;
    for decl in declarations {
      if let Node::Declaration { name } = decl {
        self.register(name.as_str(), offset);
        offset -= SLOT_SIZE;
      }
    }
    -(offset + SLOT_SIZE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn offsets_decrease_in_declaration_order() {
    let decls: NodeList = ["x", "y", "z"].into_iter().map(Node::declaration).collect();
    let mut table = SymbolTable::new();
    let frame = table.assign_offsets(&decls);

    assert_eq!(frame, 12);
    assert_eq!(table.lookup("x"), Some(-4));
    assert_eq!(table.lookup("y"), Some(-8));
    assert_eq!(table.lookup("z"), Some(-12));
  }

  #[test]
  fn no_declarations_reserve_nothing() {
    let mut table = SymbolTable::new();
    assert_eq!(table.assign_offsets(&NodeList::new()), 0);
    assert!(table.is_empty());
  }

  #[test]
  fn latest_binding_shadows_earlier_one() {
    let mut table = SymbolTable::new();
    table.register("a", -4);
    table.register("a", -8);
    assert_eq!(table.lookup("a"), Some(-8));
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn missing_name_and_clear() {
    let mut table = SymbolTable::new();
    table.register("a", -4);
    assert_eq!(table.lookup("b"), None);
    table.clear();
    assert_eq!(table.lookup("a"), None);
  }
}
