//! Recursive-descent parser producing the program tree.
//!
//! The parser plays the part of a grammar's semantic actions: it reads the
//! source strictly left to right, prepends each finished statement or
//! declaration onto the list of the block it belongs to, and hands the raw
//! lists to the `Node` constructors when the block closes. The constructors put
//! the lists back into source order.

use tracing::trace;

use crate::ast::{BinaryOp, Node, NodeList};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Parse a whole translation unit: exactly one function.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Node> {
  let mut stream = TokenStream::new(tokens, source);

  if stream.is_eof() {
    return Err(CompileError::at(source, 0, "program is empty"));
  }

  let function = parse_function(&mut stream)?;

  if !stream.is_eof() {
    let token = stream.current().ok_or_else(|| {
      CompileError::at(source, source.len(), "unexpected end of input after function")
    })?;
    let got = describe_token(Some(token), source);
    return Err(CompileError::at(
      source,
      token.loc,
      format!("unexpected token \"{got}\" after function body"),
    ));
  }

  Ok(Node::program(function))
}

fn parse_function(stream: &mut TokenStream) -> CompileResult<Node> {
  stream.skip_keyword("int")?;
  let (name, _) = stream.get_ident()?;
  stream.skip("(")?;
  stream.equal_keyword("void");
  stream.skip(")")?;
  stream.skip("{")?;

  let mut declarations = NodeList::new();
  while stream.equal_keyword("int") {
    loop {
      let (var, _) = stream.get_ident()?;
      declarations = declarations.prepend(Node::declaration(var));
      if !stream.equal(",") {
        break;
      }
    }
    stream.skip(";")?;
  }

  let statements = parse_stmt_list(stream)?;
  trace!(
    function = name,
    declarations = declarations.len(),
    statements = statements.len(),
    "parsed function body"
  );
  Ok(Node::function(name, declarations, statements))
}

/// Statements up to and including the closing `}`; the opening brace has
/// already been consumed. The result is newest-first.
fn parse_stmt_list(stream: &mut TokenStream) -> CompileResult<NodeList> {
  let mut list = NodeList::new();
  while !stream.equal("}") {
    if stream.is_eof() {
      stream.skip("}")?;
    }
    list = list.prepend(parse_stmt(stream)?);
  }
  Ok(list)
}

/// A braced block, or a single statement standing in for one.
fn parse_block(stream: &mut TokenStream) -> CompileResult<NodeList> {
  if stream.equal("{") {
    let list = parse_stmt_list(stream)?;
    trace!(statements = list.len(), "closed block");
    Ok(list)
  } else {
    Ok(NodeList::new().prepend(parse_stmt(stream)?))
  }
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Node> {
  if stream.equal_keyword("return") {
    let expr = parse_expr(stream)?;
    stream.skip(";")?;
    return Ok(Node::return_stmt(expr));
  }

  if stream.equal_keyword("if") {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let then_body = parse_block(stream)?;
    let else_body = if stream.equal_keyword("else") {
      Some(parse_block(stream)?)
    } else {
      None
    };
    return Ok(Node::if_stmt(cond, then_body, else_body));
  }

  if stream.equal_keyword("while") {
    stream.skip("(")?;
    let cond = parse_expr(stream)?;
    stream.skip(")")?;
    let body = parse_block(stream)?;
    return Ok(Node::while_stmt(cond, body));
  }

  if stream.peek_keyword("int") {
    return Err(CompileError::at(
      stream.source,
      stream.loc(),
      "declarations must come before the first statement",
    ));
  }

  let expr = parse_expr(stream)?;
  stream.skip(";")?;
  Ok(Node::expr_stmt(expr))
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<Node> {
  let loc = stream.loc();
  let node = parse_equality(stream)?;

  if stream.equal("=") {
    let Node::Identifier { name } = node else {
      return Err(CompileError::at(
        stream.source,
        loc,
        "left side of '=' must be a variable",
      ));
    };
    let rhs = parse_assign(stream)?;
    return Ok(Node::assign(name, rhs));
  }

  Ok(node)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Node> {
  let mut node = parse_relational(stream)?;

  loop {
    let op = match stream.peek_punctuator() {
      Some("==") => BinaryOp::Eq,
      Some("!=") => BinaryOp::Ne,
      _ => break,
    };

    stream.skip(op.symbol())?;
    let rhs = parse_relational(stream)?;
    node = Node::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Node> {
  let mut node = parse_add(stream)?;

  loop {
    let op = match stream.peek_punctuator() {
      Some("<") => BinaryOp::Lt,
      Some(">") => BinaryOp::Gt,
      _ => break,
    };

    stream.skip(op.symbol())?;
    let rhs = parse_add(stream)?;
    node = Node::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Node> {
  let mut node = parse_mul(stream)?;

  loop {
    let op = match stream.peek_punctuator() {
      Some("+") => BinaryOp::Add,
      Some("-") => BinaryOp::Sub,
      _ => break,
    };

    stream.skip(op.symbol())?;
    let rhs = parse_mul(stream)?;
    node = Node::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Node> {
  let mut node = parse_primary(stream)?;

  loop {
    let op = match stream.peek_punctuator() {
      Some("*") => BinaryOp::Mul,
      Some("/") => BinaryOp::Div,
      _ => break,
    };

    stream.skip(op.symbol())?;
    let rhs = parse_primary(stream)?;
    node = Node::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Node> {
  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  if matches!(stream.peek().map(|token| token.kind), Some(TokenKind::Ident)) {
    let (name, _) = stream.get_ident()?;
    return Ok(Node::identifier(name));
  }

  let (value, _) = stream.get_number()?;
  Ok(Node::number(value))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn current(&self) -> Option<&Token> {
    self.peek()
  }

  /// Byte offset of the current token, or end of input.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  fn peek_punctuator(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, self.source))
  }

  fn peek_keyword(&self, keyword: &str) -> bool {
    self
      .peek()
      .is_some_and(|token| token.kind == TokenKind::Keyword && token_text(token, self.source) == keyword)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the current token if it is the given keyword.
  fn equal_keyword(&mut self, keyword: &str) -> bool {
    if self.peek_keyword(keyword) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.expected(&format!("\"{s}\"")))
    }
  }

  fn skip_keyword(&mut self, keyword: &str) -> CompileResult<()> {
    if self.equal_keyword(keyword) {
      Ok(())
    } else {
      Err(self.expected(&format!("\"{keyword}\"")))
    }
  }

  fn expected(&self, what: &str) -> CompileError {
    let (loc, got) = match self.tokens.get(self.pos) {
      Some(token) => (token.loc, describe_token(Some(token), self.source)),
      None => (self.source.len(), "EOF".to_string()),
    };
    CompileError::at(
      self.source,
      loc,
      format!("expected {what}, but got \"{got}\""),
    )
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i32, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::at(
          self.source,
          token.loc,
          "internal error: numeric token missing value",
        )
      })?;
      let loc = token.loc;
      self.pos += 1;
      return Ok((value, loc));
    }

    Err(self.expected("an expression"))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(&'a str, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Ident
    {
      let loc = token.loc;
      let name = token_text(token, self.source);
      self.pos += 1;
      return Ok((name, loc));
    }

    Err(self.expected("an identifier"))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }
}
