//! Compiler options.
//!
//! Resolution order is command-line flags, then `MICROC_*` environment
//! variables, then defaults. The environment is read through a lookup closure
//! so callers (and tests) can supply their own source.

use std::path::PathBuf;
use std::{env, fmt};

use tracing::Level;

use crate::error::{CompileError, CompileResult};

const UNRESOLVED_ENV: &str = "MICROC_UNRESOLVED";
const PRINT_AST_ENV: &str = "MICROC_PRINT_AST";
const LOG_ENV: &str = "MICROC_LOG";
const DEFAULT_OUTPUT: &str = "output.s";

/// What code generation does when an identifier is not in the symbol table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedPolicy {
  /// Report a diagnostic, load/store through offset 0, keep generating.
  #[default]
  Continue,
  /// Stop the compilation unit with `CompileError::UnresolvedIdentifier`.
  Abort,
}

impl UnresolvedPolicy {
  fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "continue" | "warn" => Some(Self::Continue),
      "abort" | "error" | "strict" => Some(Self::Abort),
      _ => None,
    }
  }
}

impl fmt::Display for UnresolvedPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UnresolvedPolicy::Continue => write!(f, "continue"),
      UnresolvedPolicy::Abort => write!(f, "abort"),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Options {
  pub unresolved: UnresolvedPolicy,
  pub print_ast: bool,
  /// `None` writes the assembly to stdout.
  pub output: Option<PathBuf>,
  pub log_level: Level,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      unresolved: UnresolvedPolicy::default(),
      print_ast: false,
      output: Some(PathBuf::from(DEFAULT_OUTPUT)),
      log_level: Level::WARN,
    }
  }
}

impl Options {
  /// Options seeded from the process environment.
  pub fn from_env() -> CompileResult<Self> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Options seeded from an arbitrary key/value source.
  pub fn from_lookup<F>(lookup: F) -> CompileResult<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut options = Self::default();

    if let Some(raw) = lookup(UNRESOLVED_ENV) {
      options.unresolved =
        UnresolvedPolicy::parse(&raw).ok_or_else(|| invalid(UNRESOLVED_ENV, &raw))?;
    }
    if let Some(raw) = lookup(PRINT_AST_ENV) {
      options.print_ast = matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
      );
    }
    if let Some(raw) = lookup(LOG_ENV) {
      options.log_level = raw.trim().parse().map_err(|_| invalid(LOG_ENV, &raw))?;
    }

    Ok(options)
  }

  pub fn with_unresolved(mut self, policy: UnresolvedPolicy) -> Self {
    self.unresolved = policy;
    self
  }
}

fn invalid(name: &str, value: &str) -> CompileError {
  CompileError::InvalidOption {
    name: name.to_string(),
    value: value.to_string(),
  }
}
