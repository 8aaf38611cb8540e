use crate::error::{Error, Result};
use std::fmt;

/// Twelve fixed execution breakpoint slots. Slot numbers shown to the user are 1-based.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Breakpoints {
    slots: [Option<u8>; Self::SLOTS],
}

impl Breakpoints {
    pub const SLOTS: usize = 12;

    /// Put a breakpoint in the first free slot, returning its 1-based number.
    pub fn add(&mut self, address: u8) -> Result<usize> {
        if self.contains(address) {
            return Err(Error::BreakpointDuplicate(address));
        }

        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(Error::BreakpointCapacityExceeded(address))?;

        *slot = Some(address);
        Ok(index + 1)
    }

    /// Clear a slot by its 1-based number, returning the address it held.
    pub fn remove(&mut self, number: usize) -> Result<u8> {
        if !(1..=Self::SLOTS).contains(&number) {
            return Err(Error::InvalidBreakpointSlot(number.to_string()));
        }

        self.slots[number - 1]
            .take()
            .ok_or(Error::BreakpointNotSet(number))
    }

    pub fn clear(&mut self) {
        self.slots = [None; Self::SLOTS];
    }

    pub fn contains(&self, address: u8) -> bool {
        self.slot_of(address).is_some()
    }

    /// 1-based number of the slot watching `address`.
    pub fn slot_of(&self, address: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| *slot == Some(address))
            .map(|index| index + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

impl fmt::Display for Breakpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(address) => writeln!(f, "{:02}. 0x{:02x}", index + 1, address)?,
                None => writeln!(f, "{:02}. Not set", index + 1)?,
            }
        }
        Ok(())
    }
}
