use std::io::Write;

use tracing::{debug, trace};

use crate::compiler::CompiledFunc;

mod instruction;
mod registers;

pub use instruction::{Instruction, RuntimeError};
pub use registers::{Register, Registers};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("instruction {index} ({opcode}) failed: {source}")]
    Instruction {
        index: usize,
        opcode: &'static str,
        source: RuntimeError,
    },
    #[error("step limit of {limit} instructions exceeded")]
    StepLimit { limit: usize },
}

impl VmError {
    pub fn code(&self) -> &'static str {
        match self {
            VmError::Instruction { source, .. } => source.code(),
            VmError::StepLimit { .. } => "OK-R008",
        }
    }
}

type VmResult<T> = Result<T, VmError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct VmOptions {
    /// Upper bound on executed instructions; `None` runs to completion.
    pub max_steps: Option<usize>,
}

/// Executes one compiled function. The function is borrowed and can be run
/// any number of times; each run gets a fresh register file.
pub struct Vm<'a> {
    func: &'a CompiledFunc,
    options: VmOptions,
}

impl<'a> Vm<'a> {
    pub fn new(func: &'a CompiledFunc) -> Self {
        Vm { func, options: VmOptions::default() }
    }

    pub fn with_options(func: &'a CompiledFunc, options: VmOptions) -> Self {
        Vm { func, options }
    }

    /// Fetch, advance, execute until the instruction list is exhausted.
    /// The first failing instruction stops the run.
    pub fn run(&self, out: &mut dyn Write) -> VmResult<Registers> {
        let instructions = &self.func.instructions;
        let mut registers = Registers::new(self.func.registers);
        let mut ip = 0;
        let mut steps = 0usize;

        debug!(instructions = instructions.len(), registers = self.func.registers, "run started");

        while let Some(instruction) = instructions.get(ip) {
            if let Some(limit) = self.options.max_steps.filter(|&limit| steps >= limit) {
                return Err(VmError::StepLimit { limit });
            }
            steps += 1;

            let index = ip;
            ip += 1;
            trace!(index, "{instruction}");

            instruction
                .execute(&mut registers, &mut ip, out)
                .map_err(|source| VmError::Instruction { index, opcode: instruction.opcode(), source })?;
        }

        debug!(steps, "run finished");
        Ok(registers)
    }
}

/// Run `func` to completion with default options.
pub fn run(func: &CompiledFunc, out: &mut dyn Write) -> VmResult<Registers> {
    Vm::new(func).run(out)
}
