pub mod assembler;
pub mod flags;
pub mod instructions;

use flags::AccessFlags;
use std::{
    fmt,
    ops::{Index, IndexMut},
};

/// The whole address space: program, data and the memory mapped display.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    data: [u8; Self::SIZE],
}

impl Memory {
    pub const SIZE: usize = 0x100;

    /// First byte of the 16 character screen
    pub const DISPLAY_START: u8 = 0xF0;

    pub const fn len(&self) -> usize {
        Self::SIZE
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn display(&self) -> &[u8] {
        &self.data[Self::DISPLAY_START as usize..]
    }

    pub const fn is_display(address: u8) -> bool {
        address >= Self::DISPLAY_START
    }

    /// Copy `bytes` into memory starting at address 0, returning how many bytes fit.
    #[cfg(test)]
    pub fn load(&mut self, bytes: &[u8]) -> usize {
        let len = bytes.len().min(Self::SIZE);
        self.data[..len].copy_from_slice(&bytes[..len]);
        len
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            data: [0; Self::SIZE],
        }
    }
}

impl Index<u8> for Memory {
    type Output = u8;

    fn index(&self, index: u8) -> &Self::Output {
        &self.data[index as usize]
    }
}

impl IndexMut<u8> for Memory {
    fn index_mut(&mut self, index: u8) -> &mut Self::Output {
        &mut self.data[index as usize]
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub reg1: u8,
    pub reg2: u8,
    pub ptr: u8,
    pub pc: u8,
}

/// Result of executing (or trying to execute) a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed,
    /// HALT, or a jump onto itself
    Halted,
    /// The byte at PC is not an opcode. PC stays where it is.
    InvalidInstruction,
    /// The machine was halted before the step, nothing changed
    AlreadyHalted,
}

/// The next machine state, together with what was touched and a line for the log.
#[derive(Debug, Clone)]
pub struct Step {
    pub machine: Machine,
    pub access: AccessFlags,
    pub outcome: Outcome,
    /// Mnemonic of the executed instruction, or the data name of an invalid opcode
    pub context: String,
    pub message: String,
}

/// See the KRIS manual: four 8-bit registers and 256 bytes of RAM.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Machine {
    pub registers: Registers,
    /// Address of the last fetched opcode, `None` until something ran
    pub opc: Option<u8>,
    pub memory: Memory,
    pub halted: bool,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_program(program: &[u8]) -> Self {
        let mut machine = Self::new();
        machine.memory.load(program);
        machine
    }

    /// Execute one instruction, leaving `self` untouched.
    pub fn step(&self) -> Step {
        let mut machine = self.clone();
        let mut access = AccessFlags::default();

        if self.halted {
            return Step {
                machine,
                access,
                outcome: Outcome::AlreadyHalted,
                context: "HALT".to_string(),
                message: "System is halted, reset to continue".to_string(),
            };
        }

        let pc = self.registers.pc;
        let opcode = self.memory[pc];
        machine.opc = Some(pc);

        let Some(instr) = instructions::decode(opcode) else {
            tracing::debug!("{}  invalid opcode 0x{:02x}", self, opcode);
            return Step {
                machine,
                access,
                outcome: Outcome::InvalidInstruction,
                context: instructions::data_name(opcode),
                message: "Invalid instruction!".to_string(),
            };
        };

        debug_assert_eq!(instr.len, instructions::len_from_nibble(opcode));
        let argument = self.memory[pc.wrapping_add(1)];
        tracing::debug!("{}  {}", self, instr.format(argument));

        let message = (instr.function)(&mut machine, argument, &mut access);
        if !instr.changes_program_counter {
            machine.registers.pc = pc.wrapping_add(instr.len);
        }

        let outcome = if machine.halted {
            Outcome::Halted
        } else {
            Outcome::Executed
        };

        Step {
            machine,
            access,
            outcome,
            context: instr.name.to_string(),
            message,
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opc = self
            .opc
            .map_or_else(|| "--".to_string(), |opc| format!("{:02X}", opc));
        write!(
            f,
            "{:02X}  R1:{:02X} R2:{:02X} PTR:{:02X} OPC:{}{}",
            self.registers.pc,
            self.registers.reg1,
            self.registers.reg2,
            self.registers.ptr,
            opc,
            if self.halted { " HALTED" } else { "" }
        )
    }
}
