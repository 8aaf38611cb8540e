use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// How a register was touched by the last instruction.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const Read  = 0b0000_0001;
        const Write = 0b0000_0010;
        const Swap  = 0b0000_0100;
    }
}

impl Access {
    const fn format(&self, flag: Access, display: char) -> char {
        if self.contains(flag) {
            display
        } else {
            '-'
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut string = String::with_capacity(3);
        string.push(self.format(Access::Read, 'R'));
        string.push(self.format(Access::Write, 'W'));
        string.push(self.format(Access::Swap, 'S'));
        write!(f, "{}", string)
    }
}

/// Everything a single step read, wrote or swapped. Only used for visualisation,
/// it is reset at the start of every step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AccessFlags {
    pub reg1: Access,
    pub reg2: Access,
    pub ptr: Access,
    pub pc: Access,
    pub memory_read: Option<u8>,
    pub memory_write: Option<u8>,
}

impl AccessFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
