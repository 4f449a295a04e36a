//! Crate root: wires together the compilation pipeline.
//!
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and builds the tree through the
//!   `ast` constructors.
//! - `ast` defines the node types and the statement lists they own.
//! - `symbol` and `label` hold the per-function frame layout and the
//!   compilation-wide jump targets.
//! - `codegen` lowers the tree into 32-bit AT&T x86 assembly.
//! - `config` and `error` are shared by every stage.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod label;
pub mod parser;
pub mod symbol;
pub mod tokenizer;

pub use ast::{BinaryOp, Node, NodeList};
pub use codegen::{Assembly, Diagnostic};
pub use config::{Options, UnresolvedPolicy};
pub use error::{CompileError, CompileResult};

/// Tokenize and parse a source string into a program tree.
pub fn parse_program(source: &str) -> CompileResult<Node> {
  let tokens = tokenizer::tokenize(source)?;
  parser::parse(tokens, source)
}

/// Compile a source string with the given options.
pub fn compile(source: &str, options: &Options) -> CompileResult<Assembly> {
  let program = parse_program(source)?;
  codegen::generate(&program, options)
}

/// Compile a source string into AT&T assembly with default options.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  compile(source, &Options::default()).map(|assembly| assembly.text)
}
