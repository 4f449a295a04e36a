//! Shared error type for every stage of the pipeline.
//!
//! Front-end errors point at the offending byte with a caret, back-end errors
//! name the identifier or path involved. Unresolved identifiers only surface
//! here when the compiler runs with the abort policy; otherwise they are
//! recorded as diagnostics and generation carries on.

use std::io;
use std::path::PathBuf;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
  #[snafu(display("{expr_line}\n{marker} {message}"))]
  WithLocation {
    expr_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("undeclared variable '{name}' in function '{function}'"))]
  UnresolvedIdentifier { name: String, function: String },

  #[snafu(display("cannot read input file {}: {source}", path.display()))]
  ReadInput { path: PathBuf, source: io::Error },

  #[snafu(display("cannot open output file {}: {source}", path.display()))]
  OpenOutput { path: PathBuf, source: io::Error },

  #[snafu(display("cannot write output file {}: {source}", path.display()))]
  WriteOutput { path: PathBuf, source: io::Error },

  #[snafu(display("invalid value {value:?} for option {name}"))]
  InvalidOption { name: String, value: String },
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  ///
  /// Only the line containing `loc` is echoed so multi-line programs stay
  /// readable; the line number is prefixed to the message.
  pub fn at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let safe_loc = loc.min(source.len());
    let line_start = source[..safe_loc].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |i| safe_loc + i);
    let line_no = source[..line_start].matches('\n').count() + 1;

    let line = &source[line_start..line_end];
    let expr_line = format!("'{line}'");
    let char_offset = source[line_start..safe_loc].chars().count() + 1; // account for opening quote
    let marker = format!("{}^", " ".repeat(char_offset));
    Self::WithLocation {
      expr_line,
      marker,
      message: format!("line {line_no}: {}", message.into()),
    }
  }
}
