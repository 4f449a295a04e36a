use std::path::PathBuf;
use std::{env, fs, process};

use microc::error::ReadInputSnafu;
use microc::{CompileResult, Options, UnresolvedPolicy, codegen, parse_program};
use snafu::ResultExt;
use tracing::{debug, info};

const USAGE: &str = "usage: microc <input.mc> [-o <output.s>] [--stdout] [--print-ast] [--strict]";

struct Invocation {
  input: PathBuf,
  options: Options,
}

/// Flags override whatever the environment selected.
fn parse_args(args: &[String], mut options: Options) -> Result<Invocation, String> {
  let mut input = None;
  let mut iter = args.iter();

  while let Some(arg) = iter.next() {
    match arg.as_str() {
      "-o" => {
        let path = iter.next().ok_or("-o needs a file name")?;
        options.output = Some(PathBuf::from(path));
      }
      "--stdout" => options.output = None,
      "--print-ast" => options.print_ast = true,
      "--strict" => options.unresolved = UnresolvedPolicy::Abort,
      flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
      path if input.is_none() => input = Some(PathBuf::from(path)),
      extra => return Err(format!("unexpected argument {extra}")),
    }
  }

  let input = input.ok_or("missing input file")?;
  Ok(Invocation { input, options })
}

fn run(invocation: &Invocation) -> CompileResult<usize> {
  let Invocation { input, options } = invocation;

  let source = fs::read_to_string(input).context(ReadInputSnafu { path: input })?;
  let program = parse_program(&source)?;
  debug!(input = %input.display(), policy = %options.unresolved, "parsed program");

  if options.print_ast {
    print!("{program}");
  }

  let diagnostics = match &options.output {
    Some(path) => {
      let diagnostics = codegen::write_assembly(&program, path, options)?;
      info!(output = %path.display(), "assembly written");
      diagnostics
    }
    None => {
      let assembly = codegen::generate(&program, options)?;
      print!("{}", assembly.text);
      assembly.diagnostics
    }
  };

  for diagnostic in &diagnostics {
    eprintln!("{diagnostic}");
  }
  Ok(diagnostics.len())
}

fn main() {
  let options = match Options::from_env() {
    Ok(options) => options,
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  };

  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_target(false)
    .with_max_level(options.log_level)
    .init();

  let args: Vec<String> = env::args().skip(1).collect();
  let invocation = match parse_args(&args, options) {
    Ok(invocation) => invocation,
    Err(message) => {
      eprintln!("{message}\n{USAGE}");
      process::exit(1);
    }
  };

  match run(&invocation) {
    Ok(0) => {}
    Ok(count) => debug!(count, "compiled with unresolved identifiers"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::io::{self, Write};
  use std::sync::{Arc, Mutex};

  use microc::CompileError;
  use tracing::Level;

  use super::*;

  /// Log sink shared with the subscriber under test.
  #[derive(Clone, Default)]
  struct Captured(Arc<Mutex<Vec<u8>>>);

  impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  fn scratch(name: &str) -> PathBuf {
    env::temp_dir().join(format!("microc-main-{}-{name}", process::id()))
  }

  fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|arg| arg.to_string()).collect()
  }

  #[test]
  fn flags_override_defaults() {
    let invocation = parse_args(
      &args(&["prog.mc", "-o", "prog.s", "--print-ast", "--strict"]),
      Options::default(),
    )
    .unwrap();
    assert_eq!(invocation.input, PathBuf::from("prog.mc"));
    assert_eq!(invocation.options.output, Some(PathBuf::from("prog.s")));
    assert!(invocation.options.print_ast);
    assert_eq!(invocation.options.unresolved, UnresolvedPolicy::Abort);
  }

  #[test]
  fn stdout_clears_output_path() {
    let invocation = parse_args(&args(&["prog.mc", "--stdout"]), Options::default()).unwrap();
    assert_eq!(invocation.options.output, None);
  }

  #[test]
  fn bad_invocations_are_rejected() {
    assert!(parse_args(&args(&[]), Options::default()).is_err());
    assert!(parse_args(&args(&["a.mc", "b.mc"]), Options::default()).is_err());
    assert!(parse_args(&args(&["a.mc", "--verbose"]), Options::default()).is_err());
    assert!(parse_args(&args(&["a.mc", "-o"]), Options::default()).is_err());
  }

  #[test]
  fn unresolved_identifier_reaches_stderr_once() {
    let input = scratch("unresolved.mc");
    let output = scratch("unresolved.s");
    fs::write(&input, "int main(void){ int x; x = y + 1; return x; }").unwrap();
    let invocation = Invocation {
      input: input.clone(),
      options: Options {
        output: Some(output.clone()),
        ..Options::default()
      },
    };

    let logs = Captured::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_writer(move || sink.clone())
      .with_max_level(Level::WARN)
      .finish();
    let reported = tracing::subscriber::with_default(subscriber, || run(&invocation)).unwrap();

    // `run` prints one line per diagnostic; the default log level adds none.
    assert_eq!(reported, 1);
    let logged = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert_eq!(logged.lines().count(), 0, "unexpected log output: {logged}");

    let _ = fs::remove_file(input);
    let _ = fs::remove_file(output);
  }

  #[test]
  fn missing_input_is_a_read_error() {
    let invocation = Invocation {
      input: scratch("missing.mc"),
      options: Options::default(),
    };
    let err = run(&invocation).unwrap_err();
    assert!(matches!(err, CompileError::ReadInput { ref path, .. } if *path == invocation.input));
  }
}
