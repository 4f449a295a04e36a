//! Abstract syntax tree and the statement lists that hang off it.
//!
//! Every node owns its children outright, so dropping the root releases the
//! whole tree. Lists are built the way grammar actions see them: newest
//! statement first. The compound-statement constructors flip each raw list
//! exactly once, so a finished tree always holds its lists in source order.

use std::fmt;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Gt,
}

impl BinaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      BinaryOp::Add => "+",
      BinaryOp::Sub => "-",
      BinaryOp::Mul => "*",
      BinaryOp::Div => "/",
      BinaryOp::Eq => "==",
      BinaryOp::Ne => "!=",
      BinaryOp::Lt => "<",
      BinaryOp::Gt => ">",
    }
  }
}

impl fmt::Display for BinaryOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

/// One node of the program tree.
#[derive(Debug, PartialEq, Eq)]
pub enum Node {
  Program {
    function: Box<Node>,
  },
  Function {
    name: String,
    declarations: NodeList,
    statements: NodeList,
  },
  Declaration {
    name: String,
  },
  Number {
    value: i32,
  },
  Identifier {
    name: String,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Node>,
    rhs: Box<Node>,
  },
  Assign {
    name: String,
    expr: Box<Node>,
  },
  /// `if` and `if`/`else`; a plain `if` has no else list.
  If {
    cond: Box<Node>,
    then_body: NodeList,
    else_body: Option<NodeList>,
  },
  While {
    cond: Box<Node>,
    body: NodeList,
  },
  Return {
    expr: Box<Node>,
  },
  ExprStmt {
    expr: Box<Node>,
  },
}

impl Node {
  pub fn program(function: Node) -> Self {
    Self::Program {
      function: Box::new(function),
    }
  }

  /// Build a function from the raw (newest-first) declaration and statement
  /// lists collected while parsing its body.
  pub fn function(name: impl Into<String>, declarations: NodeList, statements: NodeList) -> Self {
    Self::Function {
      name: name.into(),
      declarations: declarations.reverse(),
      statements: statements.reverse(),
    }
  }

  pub fn declaration(name: impl Into<String>) -> Self {
    Self::Declaration { name: name.into() }
  }

  pub fn number(value: i32) -> Self {
    Self::Number { value }
  }

  pub fn identifier(name: impl Into<String>) -> Self {
    Self::Identifier { name: name.into() }
  }

  pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(name: impl Into<String>, expr: Node) -> Self {
    Self::Assign {
      name: name.into(),
      expr: Box::new(expr),
    }
  }

  /// Build an `if` from raw (newest-first) body lists.
  pub fn if_stmt(cond: Node, then_body: NodeList, else_body: Option<NodeList>) -> Self {
    Self::If {
      cond: Box::new(cond),
      then_body: then_body.reverse(),
      else_body: else_body.map(NodeList::reverse),
    }
  }

  /// Build a `while` from a raw (newest-first) body list.
  pub fn while_stmt(cond: Node, body: NodeList) -> Self {
    Self::While {
      cond: Box::new(cond),
      body: body.reverse(),
    }
  }

  pub fn return_stmt(expr: Node) -> Self {
    Self::Return {
      expr: Box::new(expr),
    }
  }

  pub fn expr_stmt(expr: Node) -> Self {
    Self::ExprStmt {
      expr: Box::new(expr),
    }
  }

  /// Short variant name used in log events.
  pub fn kind(&self) -> &'static str {
    match self {
      Node::Program { .. } => "program",
      Node::Function { .. } => "function",
      Node::Declaration { .. } => "declaration",
      Node::Number { .. } => "number",
      Node::Identifier { .. } => "identifier",
      Node::Binary { .. } => "binary",
      Node::Assign { .. } => "assign",
      Node::If { .. } => "if",
      Node::While { .. } => "while",
      Node::Return { .. } => "return",
      Node::ExprStmt { .. } => "expression statement",
    }
  }

  fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    pad(f, indent)?;
    match self {
      Node::Program { function } => {
        writeln!(f, "Program")?;
        function.write_tree(f, indent + 1)
      }
      Node::Function {
        name,
        declarations,
        statements,
      } => {
        writeln!(f, "Function: {name}")?;
        heading(f, indent + 1, "Declarations:")?;
        declarations.write_tree(f, indent + 2)?;
        heading(f, indent + 1, "Statements:")?;
        statements.write_tree(f, indent + 2)
      }
      Node::Declaration { name } => writeln!(f, "Declaration: {name}"),
      Node::Number { value } => writeln!(f, "Number: {value}"),
      Node::Identifier { name } => writeln!(f, "Identifier: {name}"),
      Node::Binary { op, lhs, rhs } => {
        writeln!(f, "{op}")?;
        lhs.write_tree(f, indent + 1)?;
        rhs.write_tree(f, indent + 1)
      }
      Node::Assign { name, expr } => {
        writeln!(f, "=")?;
        heading(f, indent + 1, &format!("Identifier: {name}"))?;
        expr.write_tree(f, indent + 1)
      }
      Node::If {
        cond,
        then_body,
        else_body,
      } => {
        match else_body {
          Some(_) => writeln!(f, "If-Else Statement")?,
          None => writeln!(f, "If Statement")?,
        }
        heading(f, indent + 1, "Condition:")?;
        cond.write_tree(f, indent + 2)?;
        heading(f, indent + 1, "If Body:")?;
        then_body.write_tree(f, indent + 2)?;
        if let Some(else_body) = else_body {
          heading(f, indent + 1, "Else Body:")?;
          else_body.write_tree(f, indent + 2)?;
        }
        Ok(())
      }
      Node::While { cond, body } => {
        writeln!(f, "While Statement")?;
        heading(f, indent + 1, "Condition:")?;
        cond.write_tree(f, indent + 2)?;
        heading(f, indent + 1, "While Body:")?;
        body.write_tree(f, indent + 2)
      }
      Node::Return { expr } => {
        writeln!(f, "Return Statement")?;
        expr.write_tree(f, indent + 1)
      }
      Node::ExprStmt { expr } => {
        writeln!(f, "Expression Statement")?;
        expr.write_tree(f, indent + 1)
      }
    }
  }
}

/// Renders the indented tree, two spaces per level.
impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.write_tree(f, 0)
  }
}

fn pad(f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
  write!(f, "{:width$}", "", width = indent * 2)
}

fn heading(f: &mut fmt::Formatter<'_>, indent: usize, text: &str) -> fmt::Result {
  pad(f, indent)?;
  writeln!(f, "{text}")
}

/// Singly-linked list of owned nodes.
///
/// Parsing only ever prepends, so a list under construction is in reverse
/// source order until [`NodeList::reverse`] relinks it.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NodeList {
  head: Option<Box<Cell>>,
}

#[derive(Debug, PartialEq, Eq)]
struct Cell {
  node: Node,
  next: Option<Box<Cell>>,
}

impl NodeList {
  pub fn new() -> Self {
    Self { head: None }
  }

  /// Push `node` in front of the current head.
  pub fn prepend(mut self, node: Node) -> Self {
    let next = self.head.take();
    Self {
      head: Some(Box::new(Cell { node, next })),
    }
  }

  /// Relink the cells in the opposite order without copying them.
  pub fn reverse(mut self) -> Self {
    let mut reversed = None;
    let mut current = self.head.take();
    while let Some(mut cell) = current {
      current = cell.next.take();
      cell.next = reversed;
      reversed = Some(cell);
    }
    Self { head: reversed }
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  pub fn len(&self) -> usize {
    self.iter().count()
  }

  pub fn iter(&self) -> NodeIter<'_> {
    NodeIter {
      current: self.head.as_deref(),
    }
  }

  fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    self.iter().try_for_each(|node| node.write_tree(f, indent))
  }
}

/// Collects in iteration order: prepend each item, then reverse once.
impl FromIterator<Node> for NodeList {
  fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
    iter
      .into_iter()
      .fold(NodeList::new(), NodeList::prepend)
      .reverse()
  }
}

impl<'a> IntoIterator for &'a NodeList {
  type Item = &'a Node;
  type IntoIter = NodeIter<'a>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

// Unlink iteratively so long statement lists don't recurse once per cell.
impl Drop for NodeList {
  fn drop(&mut self) {
    let mut current = self.head.take();
    while let Some(mut cell) = current {
      current = cell.next.take();
    }
  }
}

pub struct NodeIter<'a> {
  current: Option<&'a Cell>,
}

impl<'a> Iterator for NodeIter<'a> {
  type Item = &'a Node;

  fn next(&mut self) -> Option<Self::Item> {
    let cell = self.current?;
    self.current = cell.next.as_deref();
    Some(&cell.node)
  }
}
