use super::{
    flags::{Access, AccessFlags},
    Machine, Memory,
};
use crate::util;
use std::fmt;

pub struct Instruction {
    pub name: &'static str,
    /// Alternative spellings accepted by the assembler
    pub aliases: &'static [&'static str],
    pub opcode: u8,
    /// Length in bytes, counting the opcode and its argument
    pub len: u8,
    /// Whether the instruction sets the program counter itself (jumps, halting)
    pub changes_program_counter: bool,
    /// Execute the instruction, returning a description for the log
    pub function: fn(&mut Machine, u8, &mut AccessFlags) -> String,
}

impl Instruction {
    pub const fn has_argument(&self) -> bool {
        self.len == 2
    }

    pub fn matches(&self, mnemonic: &str) -> bool {
        self.name.eq_ignore_ascii_case(mnemonic)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(mnemonic))
    }

    pub fn format(&self, argument: u8) -> String {
        if self.has_argument() {
            format!("{} 0x{:02x}", self.name, argument)
        } else {
            self.name.to_string()
        }
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.opcode == other.opcode
    }
}

impl Eq for Instruction {}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("name", &self.name)
            .field("opcode", &format_args!("{:#04x}", self.opcode))
            .field("len", &self.len)
            .finish()
    }
}

/// Look up the instruction for an opcode, `None` for bytes that are plain data.
pub fn decode(opcode: u8) -> Option<&'static Instruction> {
    INSTRUCTIONS.iter().find(|instr| instr.opcode == opcode)
}

/// Look up an instruction by its mnemonic, used by the assembler.
pub fn from_mnemonic(mnemonic: &str) -> Option<&'static Instruction> {
    INSTRUCTIONS.iter().find(|instr| instr.matches(mnemonic))
}

/// Name shown for a byte that is not an instruction.
pub fn data_name(value: u8) -> String {
    format!("DB[{:02x}]", value)
}

/// Number of bytes occupied by whatever is stored at `address`. Unmapped bytes
/// count as a single byte of data.
pub fn len_at(memory: &Memory, address: u8) -> u8 {
    decode(memory[address]).map_or(1, |instr| instr.len)
}

/// Format the instruction stored at `address` to a human-readable string.
pub fn format(memory: &Memory, address: u8) -> String {
    let opcode = memory[address];
    match decode(opcode) {
        Some(instr) => instr.format(memory[address.wrapping_add(1)]),
        None => data_name(opcode),
    }
}

/// Decode shortcut: a high nibble of 2 marks a two byte instruction.
pub const fn len_from_nibble(opcode: u8) -> u8 {
    if util::high_nibble(opcode) == 2 {
        2
    } else {
        1
    }
}

#[rustfmt::skip]
pub static INSTRUCTIONS: [Instruction; 9] = [
    Instruction { name: "HALT",     aliases: &["HLT"],    opcode: 0x0F, len: 1, changes_program_counter: true,  function: opcodes::halt },
    Instruction { name: "XOR",      aliases: &[],         opcode: 0x10, len: 1, changes_program_counter: false, function: opcodes::xor },
    Instruction { name: "ADD",      aliases: &[],         opcode: 0x11, len: 1, changes_program_counter: false, function: opcodes::add },
    Instruction { name: "LOAD",     aliases: &[],         opcode: 0x12, len: 1, changes_program_counter: false, function: opcodes::load },
    Instruction { name: "STORE",    aliases: &[],         opcode: 0x13, len: 1, changes_program_counter: false, function: opcodes::store },
    Instruction { name: "SET_PTR",  aliases: &[],         opcode: 0x14, len: 1, changes_program_counter: false, function: opcodes::set_ptr },
    Instruction { name: "SWAP",     aliases: &[],         opcode: 0x15, len: 1, changes_program_counter: false, function: opcodes::swap },
    Instruction { name: "SET_REG1", aliases: &["SET_R1"], opcode: 0x20, len: 2, changes_program_counter: false, function: opcodes::set_reg1 },
    Instruction { name: "JNZ",      aliases: &[],         opcode: 0x21, len: 2, changes_program_counter: true,  function: opcodes::jnz },
];

mod opcodes {
    use super::*;

    pub fn halt(cpu: &mut Machine, _: u8, _: &mut AccessFlags) -> String {
        cpu.halted = true;
        "System Halted!".to_string()
    }

    pub fn xor(cpu: &mut Machine, _: u8, access: &mut AccessFlags) -> String {
        let regs = &mut cpu.registers;
        let result = regs.reg1 ^ regs.reg2;
        let message = format!(
            "R1    = 0x{:02x} (R1) ^ 0x{:02x} (R2) = 0x{:02x}",
            regs.reg1, regs.reg2, result
        );
        regs.reg1 = result;
        access.reg1 = Access::Read | Access::Write;
        access.reg2 = Access::Read;
        message
    }

    pub fn add(cpu: &mut Machine, _: u8, access: &mut AccessFlags) -> String {
        let regs = &mut cpu.registers;
        let result = regs.reg1.wrapping_add(regs.reg2);
        let message = format!(
            "R1    = 0x{:02x} (R1) + 0x{:02x} (R2) = 0x{:02x}",
            regs.reg1, regs.reg2, result
        );
        regs.reg1 = result;
        access.reg1 = Access::Read | Access::Write;
        access.reg2 = Access::Read;
        message
    }

    pub fn load(cpu: &mut Machine, _: u8, access: &mut AccessFlags) -> String {
        let ptr = cpu.registers.ptr;
        cpu.registers.reg1 = cpu.memory[ptr];
        access.reg1 = Access::Write;
        access.ptr = Access::Read;
        access.memory_read = Some(ptr);
        format!("R1    = *0x{:02x} = 0x{:02x}", ptr, cpu.registers.reg1)
    }

    pub fn store(cpu: &mut Machine, _: u8, access: &mut AccessFlags) -> String {
        let ptr = cpu.registers.ptr;
        cpu.memory[ptr] = cpu.registers.reg1;
        access.reg1 = Access::Read;
        access.ptr = Access::Read;
        access.memory_write = Some(ptr);
        format!("*0x{:02x} = 0x{:02x}", ptr, cpu.registers.reg1)
    }

    pub fn set_ptr(cpu: &mut Machine, _: u8, access: &mut AccessFlags) -> String {
        cpu.registers.ptr = cpu.registers.reg1;
        access.reg1 = Access::Read;
        access.ptr = Access::Write;
        format!("PTR   = 0x{:02x}", cpu.registers.ptr)
    }

    pub fn swap(cpu: &mut Machine, _: u8, access: &mut AccessFlags) -> String {
        let regs = &mut cpu.registers;
        std::mem::swap(&mut regs.reg1, &mut regs.reg2);
        access.reg1 = Access::Swap;
        access.reg2 = Access::Swap;
        format!("R1    = 0x{:02x} ; R2 = 0x{:02x}", regs.reg1, regs.reg2)
    }

    pub fn set_reg1(cpu: &mut Machine, argument: u8, access: &mut AccessFlags) -> String {
        cpu.registers.reg1 = argument;
        access.reg1 = Access::Write;
        access.memory_read = Some(cpu.registers.pc.wrapping_add(1));
        format!("R1    = 0x{:02x} (imm)", argument)
    }

    pub fn jnz(cpu: &mut Machine, argument: u8, access: &mut AccessFlags) -> String {
        let pc = cpu.registers.pc;
        access.reg1 = Access::Read;
        access.memory_read = Some(pc.wrapping_add(1));

        if cpu.registers.reg1 == 0 {
            cpu.registers.pc = pc.wrapping_add(2);
            return format!("PC    = 0x{:02x} (Jump NOT taken)", cpu.registers.pc);
        }

        cpu.registers.pc = argument;
        access.pc = Access::Write;
        if argument == pc {
            // Jumping onto ourselves would spin forever
            cpu.halted = true;
            return format!("Infinite Jump loop at 0x{:02x}, System Halted!", pc);
        }
        format!("PC    = 0x{:02x} (Jump taken)", argument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_mapped_and_unmapped() {
        assert_eq!(decode(0x21).map(|i| i.name), Some("JNZ"));
        assert_eq!(decode(0x0F).map(|i| i.name), Some("HALT"));
        assert!(decode(0x00).is_none());
        assert!(decode(0x16).is_none());
        assert!(decode(0xFF).is_none());
    }

    #[test]
    fn nibble_shortcut_agrees_with_table() {
        for instr in INSTRUCTIONS.iter() {
            assert_eq!(instr.len, len_from_nibble(instr.opcode), "{}", instr.name);
        }
    }

    #[test]
    fn opcodes_are_unique() {
        for (index, instr) in INSTRUCTIONS.iter().enumerate() {
            assert!(INSTRUCTIONS[index + 1..]
                .iter()
                .all(|other| other.opcode != instr.opcode));
        }
    }

    #[test]
    fn mnemonics_and_aliases() {
        assert_eq!(from_mnemonic("SET_R1").map(|i| i.opcode), Some(0x20));
        assert_eq!(from_mnemonic("set_reg1").map(|i| i.opcode), Some(0x20));
        assert_eq!(from_mnemonic("HLT").map(|i| i.opcode), Some(0x0F));
        assert!(from_mnemonic("BOGUS").is_none());
    }

    #[test]
    fn format_memory() {
        let mut memory = Memory::default();
        memory[0] = 0x20;
        memory[1] = 0x2A;
        memory[2] = 0x10;
        memory[3] = 0xAB;
        assert_eq!(format(&memory, 0), "SET_REG1 0x2a");
        assert_eq!(format(&memory, 2), "XOR");
        assert_eq!(format(&memory, 3), "DB[ab]");
        assert_eq!(len_at(&memory, 0), 2);
        assert_eq!(len_at(&memory, 3), 1);
    }
}
