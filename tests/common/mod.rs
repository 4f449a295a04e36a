//! A tiny interpreter for the 32-bit instruction subset the code generator
//! emits. Running the generated text checks operand order, control flow and
//! return values without an assembler.

use std::collections::HashMap;

const STACK_TOP: i32 = 0x1_0000;
const RETURN_SENTINEL: i32 = -1;
const STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone)]
struct Instruction {
  mnemonic: String,
  operands: Vec<String>,
}

#[derive(Debug, Default)]
struct Machine {
  eax: i32,
  ebx: i32,
  edx: i32,
  esp: i32,
  ebp: i32,
  memory: HashMap<i32, i32>,
  /// Operands of the last `cmpl`, as (destination, source).
  compared: (i32, i32),
}

/// Run the function at `entry` and return its `%eax` on the final `ret`.
pub fn run(asm: &str, entry: &str) -> Result<i32, String> {
  let (program, labels) = load(asm)?;
  let mut pc = *labels
    .get(entry)
    .ok_or_else(|| format!("entry symbol {entry} not found"))?;

  let mut machine = Machine {
    esp: STACK_TOP,
    ebp: STACK_TOP,
    ..Machine::default()
  };
  machine.push(RETURN_SENTINEL);

  for _ in 0..STEP_LIMIT {
    let instruction = program
      .get(pc)
      .ok_or_else(|| format!("fell off the end of the program at {pc}"))?;
    pc += 1;

    let ops = &instruction.operands;
    match instruction.mnemonic.as_str() {
      "movl" => {
        let value = machine.read(&ops[0])?;
        machine.write(&ops[1], value)?;
      }
      "pushl" => {
        let value = machine.read(&ops[0])?;
        machine.push(value);
      }
      "popl" => {
        let value = machine.pop()?;
        machine.write(&ops[0], value)?;
      }
      "addl" | "subl" | "imull" => {
        let src = machine.read(&ops[0])?;
        let dst = machine.read(&ops[1])?;
        let result = match instruction.mnemonic.as_str() {
          "addl" => dst.wrapping_add(src),
          "subl" => dst.wrapping_sub(src),
          _ => dst.wrapping_mul(src),
        };
        machine.write(&ops[1], result)?;
      }
      "xchgl" => {
        let a = machine.read(&ops[0])?;
        let b = machine.read(&ops[1])?;
        machine.write(&ops[0], b)?;
        machine.write(&ops[1], a)?;
      }
      "cdq" => machine.edx = if machine.eax < 0 { -1 } else { 0 },
      "idivl" => {
        let divisor = machine.read(&ops[0])? as i64;
        if divisor == 0 {
          return Err("division by zero".into());
        }
        let dividend = ((machine.edx as i64) << 32) | (machine.eax as u32 as i64);
        machine.eax = (dividend / divisor) as i32;
        machine.edx = (dividend % divisor) as i32;
      }
      "cmpl" => {
        let src = machine.read(&ops[0])?;
        let dst = machine.read(&ops[1])?;
        machine.compared = (dst, src);
      }
      "sete" | "setne" | "setl" | "setg" => {
        let (dst, src) = machine.compared;
        let flag = match instruction.mnemonic.as_str() {
          "sete" => dst == src,
          "setne" => dst != src,
          "setl" => dst < src,
          _ => dst > src,
        };
        machine.write(&ops[0], flag as i32)?;
      }
      "movzbl" => {
        let value = machine.read(&ops[0])? & 0xff;
        machine.write(&ops[1], value)?;
      }
      "je" | "jmp" => {
        let taken = instruction.mnemonic == "jmp" || machine.compared.0 == machine.compared.1;
        if taken {
          pc = *labels
            .get(&ops[0])
            .ok_or_else(|| format!("unknown label {}", ops[0]))?;
        }
      }
      "ret" => {
        let target = machine.pop()?;
        if target == RETURN_SENTINEL {
          return Ok(machine.eax);
        }
        return Err(format!("ret to unexpected address {target}"));
      }
      other => return Err(format!("unsupported instruction {other}")),
    }
  }

  Err("step limit exceeded".into())
}

impl Machine {
  fn push(&mut self, value: i32) {
    self.esp -= 4;
    self.memory.insert(self.esp, value);
  }

  fn pop(&mut self) -> Result<i32, String> {
    let value = *self
      .memory
      .get(&self.esp)
      .ok_or_else(|| format!("pop from empty slot {}", self.esp))?;
    self.esp += 4;
    Ok(value)
  }

  fn read(&self, operand: &str) -> Result<i32, String> {
    if let Some(imm) = operand.strip_prefix('$') {
      return imm.parse().map_err(|_| format!("bad immediate {operand}"));
    }
    if let Some(offset) = frame_offset(operand) {
      // Uninitialised locals read as zero.
      return Ok(self.memory.get(&(self.ebp + offset?)).copied().unwrap_or(0));
    }
    match operand {
      "%eax" => Ok(self.eax),
      "%al" => Ok(self.eax & 0xff),
      "%ebx" => Ok(self.ebx),
      "%edx" => Ok(self.edx),
      "%esp" => Ok(self.esp),
      "%ebp" => Ok(self.ebp),
      _ => Err(format!("cannot read {operand}")),
    }
  }

  fn write(&mut self, operand: &str, value: i32) -> Result<(), String> {
    if let Some(offset) = frame_offset(operand) {
      self.memory.insert(self.ebp + offset?, value);
      return Ok(());
    }
    match operand {
      "%eax" => self.eax = value,
      "%al" => self.eax = (self.eax & !0xff) | (value & 0xff),
      "%ebx" => self.ebx = value,
      "%edx" => self.edx = value,
      "%esp" => self.esp = value,
      "%ebp" => self.ebp = value,
      _ => return Err(format!("cannot write {operand}")),
    }
    Ok(())
  }
}

fn frame_offset(operand: &str) -> Option<Result<i32, String>> {
  let offset = operand.strip_suffix("(%ebp)")?;
  Some(offset.parse().map_err(|_| format!("bad frame operand {operand}")))
}

type Loaded = (Vec<Instruction>, HashMap<String, usize>);

fn load(asm: &str) -> Result<Loaded, String> {
  let mut program = Vec::new();
  let mut labels = HashMap::new();

  for line in asm.lines() {
    if line.starts_with('.') || line.trim().is_empty() {
      continue;
    }
    if let Some(label) = line.strip_suffix(':') {
      if labels.insert(label.to_string(), program.len()).is_some() {
        return Err(format!("label {label} defined twice"));
      }
      continue;
    }
    let line = line
      .strip_prefix("  ")
      .ok_or_else(|| format!("instruction not indented: {line:?}"))?;
    let (mnemonic, rest) = line.split_once(' ').unwrap_or((line, ""));
    let operands = rest
      .split(", ")
      .filter(|operand| !operand.is_empty())
      .map(str::to_string)
      .collect();
    program.push(Instruction {
      mnemonic: mnemonic.to_string(),
      operands,
    });
  }

  Ok((program, labels))
}

/// Compile `source` with default options and run `main`.
pub fn run_source(source: &str) -> i32 {
  let asm = microc::generate_assembly(source).expect("compiles");
  run(&asm, "main").unwrap_or_else(|err| panic!("{err}\n{asm}"))
}

