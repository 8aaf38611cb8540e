//! What a front-end gets to see of a debugging session, and a plain text rendering of it.

use crate::{
    cpu::{flags::AccessFlags, instructions, Machine, Memory},
    debugger::{breakpoints::Breakpoints, log::Entry, step_state::StepState},
    util,
};
use std::{fmt, time::Duration};

/// How the memory mapped screen at 0xF0-0xFF is shown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Screen memory is masked
    #[default]
    Disabled,
    Hex,
    Ascii,
}

impl DisplayMode {
    pub const fn next(self) -> Self {
        match self {
            Self::Disabled => Self::Hex,
            Self::Hex => Self::Ascii,
            Self::Ascii => Self::Disabled,
        }
    }

    /// Whether the screen region of memory may be shown.
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// The 16 screen cells as a line of text.
pub fn display_line(memory: &Memory, mode: DisplayMode) -> String {
    match mode {
        DisplayMode::Disabled => "<DISABLED>".to_string(),
        DisplayMode::Hex => memory
            .display()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<Vec<_>>()
            .join(" "),
        DisplayMode::Ascii => memory
            .display()
            .iter()
            .map(|&byte| util::display_char(byte))
            .collect(),
    }
}

/// Everything a renderer needs, borrowed from the session.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub machine: &'a Machine,
    pub access: &'a AccessFlags,
    pub breakpoints: &'a Breakpoints,
    pub step: &'a StepState,
    /// Tail of the session log
    pub log: &'a [Entry],
    pub clock_hz: f64,
    /// Time spent running
    pub run_time: Duration,
    pub display: DisplayMode,
    /// Address being edited in program or assembly mode
    pub cursor: Option<u8>,
}

impl Snapshot<'_> {
    const DISASSEMBLY_LINES: usize = 8;
    const ROW_LEN: usize = 16;

    fn status(&self) -> &'static str {
        if self.machine.halted {
            "HALTED"
        } else if self.step.is_running() {
            "RUNNING"
        } else {
            "STEP"
        }
    }

    /// Marker put in front of a memory cell.
    fn marker(&self, address: u8) -> char {
        if self.cursor == Some(address) {
            '>'
        } else if self.machine.registers.pc == address {
            '@'
        } else if self.access.memory_write == Some(address) {
            '*'
        } else if self.access.memory_read == Some(address) {
            '+'
        } else if self.breakpoints.contains(address) {
            '!'
        } else {
            ' '
        }
    }

    fn write_memory(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "    ")?;
        for column in 0..Self::ROW_LEN {
            write!(f, "  {:x} ", column)?;
        }
        writeln!(f)?;

        let memory = &self.machine.memory;
        for row in (0..Memory::SIZE).step_by(Self::ROW_LEN) {
            write!(f, "{:02x}: ", row)?;
            for address in row..row + Self::ROW_LEN {
                let address = address as u8;
                write!(f, "{}", self.marker(address))?;
                if Memory::is_display(address) && !self.display.is_enabled() {
                    write!(f, "?? ")?;
                } else {
                    write!(f, "{:02x} ", memory[address])?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }

    fn write_registers(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regs = &self.machine.registers;
        let access = self.access;
        writeln!(f, "PC   0x{:02x} [{}]", regs.pc, access.pc)?;
        writeln!(f, "R1   0x{:02x} [{}]", regs.reg1, access.reg1)?;
        writeln!(f, "R2   0x{:02x} [{}]", regs.reg2, access.reg2)?;
        writeln!(f, "PTR  0x{:02x} [{}]", regs.ptr, access.ptr)
    }

    fn write_disassembly(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memory = &self.machine.memory;
        match self.machine.opc {
            Some(opc) => writeln!(f, "OPC  0x{:02x}: {}", opc, instructions::format(memory, opc))?,
            None => writeln!(f, "OPC  --")?,
        }

        let mut address = self.machine.registers.pc;
        for _ in 0..Self::DISASSEMBLY_LINES {
            writeln!(f, "     0x{:02x}: {}", address, instructions::format(memory, address))?;
            let next = address.wrapping_add(instructions::len_at(memory, address));
            if next < address {
                break;
            }
            address = next;
        }
        Ok(())
    }
}

impl fmt::Display for Snapshot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_memory(f)?;
        writeln!(f)?;
        writeln!(f, "DISPLAY [{}]", display_line(&self.machine.memory, self.display))?;
        writeln!(f)?;
        self.write_registers(f)?;
        writeln!(f)?;
        self.write_disassembly(f)?;
        writeln!(f)?;
        if self.breakpoints.is_empty() {
            writeln!(f, "No breakpoints set")?;
        } else {
            write!(f, "{}", self.breakpoints)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{} | CLK {:.2} Hz | RUN {}",
            self.status(),
            self.clock_hz,
            util::format_minutes(self.run_time)
        )?;
        for entry in self.log {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}
