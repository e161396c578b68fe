//! The SUBLANQ virtual machine
//!
//! Memory is a fixed array of `i64` and the program counter indexes it. Each
//! step reads the triple at `pc` and decodes it:
//!
//! - `(-1, b, c)`: `mem[b] = input(c)`
//! - `(a, -1, c)`: `output(c, mem[a])`
//! - `(a, b, -1)`: halt
//! - `(a, b, c)`: `mem[a] -= mem[b]`, jump to `c` if the result is `<= 0`
//!
//! Execution stops on a halt or when `pc` no longer points at a full triple.

use crate::error::{Result, SublanqError};
use crate::ports::Ports;

/// Operand value that marks input, output and halt
pub const SENTINEL: i64 = -1;

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Input { dest: i64, port: i64 },
    Output { src: i64, port: i64 },
    Halt,
    SubtractBranch { a: i64, b: i64, target: i64 },
}

impl Instruction {
    /// Decode a raw triple; the first sentinel operand wins
    pub fn decode(a: i64, b: i64, c: i64) -> Self {
        if a == SENTINEL {
            Instruction::Input { dest: b, port: c }
        } else if b == SENTINEL {
            Instruction::Output { src: a, port: c }
        } else if c == SENTINEL {
            Instruction::Halt
        } else {
            Instruction::SubtractBranch { a, b, target: c }
        }
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction ran and `pc` points at the next one
    Continue,
    /// A halt instruction was decoded
    Halt,
    /// `pc` does not address a full triple, nothing ran
    OutOfRange,
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Stopped on a halt instruction
    Halted { steps: u64 },
    /// `pc` left the addressable range
    LeftMemory { pc: i64, steps: u64 },
}

impl Exit {
    /// Number of instructions executed, the halt included
    pub fn steps(&self) -> u64 {
        match self {
            Exit::Halted { steps } | Exit::LeftMemory { steps, .. } => *steps,
        }
    }
}

/// Machine state: memory and program counter
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    memory: Vec<i64>,
    pc: i64,
}

impl Machine {
    /// Create a machine over a loaded memory image, starting at address 0
    pub fn new(memory: Vec<i64>) -> Self {
        Self { memory, pc: 0 }
    }

    pub fn memory(&self) -> &[i64] {
        &self.memory
    }

    pub fn pc(&self) -> i64 {
        self.pc
    }

    /// Whether `pc` addresses a full triple
    pub fn is_running(&self) -> bool {
        self.pc >= 0 && self.pc < self.memory.len() as i64 - 2
    }

    /// Decode the instruction at `pc`, if there is one
    pub fn fetch(&self) -> Option<Instruction> {
        if !self.is_running() {
            return None;
        }
        let pc = self.pc as usize;
        Some(Instruction::decode(
            self.memory[pc],
            self.memory[pc + 1],
            self.memory[pc + 2],
        ))
    }

    /// Check an operand used as a memory address
    fn address(&self, index: i64) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.memory.len())
            .ok_or_else(|| SublanqError::IndexOutOfRange {
                pc: self.pc,
                index,
                size: self.memory.len(),
            })
    }

    /// Execute one instruction
    pub fn step<P: Ports + ?Sized>(&mut self, ports: &mut P) -> Result<Step> {
        let instruction = match self.fetch() {
            Some(instruction) => instruction,
            None => return Ok(Step::OutOfRange),
        };
        log::trace!("{:>6}: {:?}", self.pc, instruction);

        match instruction {
            Instruction::Input { dest, port } => {
                let dest = self.address(dest)?;
                self.memory[dest] = ports.input(port)?;
                self.pc += 3;
            }
            Instruction::Output { src, port } => {
                let src = self.address(src)?;
                ports.output(port, self.memory[src])?;
                self.pc += 3;
            }
            Instruction::Halt => return Ok(Step::Halt),
            Instruction::SubtractBranch { a, b, target } => {
                let a = self.address(a)?;
                let b = self.address(b)?;
                let result = self.memory[a].wrapping_sub(self.memory[b]);
                self.memory[a] = result;
                if result <= 0 {
                    self.pc = target;
                } else {
                    self.pc += 3;
                }
            }
        }

        Ok(Step::Continue)
    }

    /// Run until a halt instruction or until `pc` leaves memory
    pub fn run<P: Ports + ?Sized>(&mut self, ports: &mut P) -> Result<Exit> {
        let mut steps = 0;
        loop {
            match self.step(ports)? {
                Step::Continue => steps += 1,
                Step::Halt => {
                    steps += 1;
                    log::debug!("halted at {} after {} steps", self.pc, steps);
                    return Ok(Exit::Halted { steps });
                }
                Step::OutOfRange => {
                    log::debug!("pc {} left memory after {} steps", self.pc, steps);
                    return Ok(Exit::LeftMemory { pc: self.pc, steps });
                }
            }
        }
    }
}
