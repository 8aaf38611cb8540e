//! Single line KRIS assembler.
//!
//! Every line is one statement, tried in this order:
//!
//! ```text
//! <blank>                 nothing
//! # comment               logged, nothing written
//! address_40h:            move the cursor to 0x40
//! XOR                     one byte instruction
//! SET_R1 0x2a             two byte instruction with a hex argument
//! 0x48 0x69               raw data, one byte per 0xXX token
//! ```

use super::{
    instructions::{self, Instruction},
    Memory,
};
use crate::{
    error::{Error, Result},
    util,
};

const COMMENT_CHAR: char = '#';
const ORIGIN_PREFIX: &str = "address_";
const ORIGIN_SUFFIX: &str = "h:";
const DATA_PREFIX: &str = "0x";

/// Tokens that show the manual instead of assembling anything.
pub const HELP_TOKENS: [&str; 5] = ["h", "m", "help", "man", "?"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Empty,
    Comment(String),
    Origin(u8),
    Instruction {
        instr: &'static Instruction,
        argument: Option<u8>,
    },
    Data(Vec<u8>),
    Help,
    Quit,
}

impl Statement {
    /// Bytes this statement puts into memory.
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Self::Instruction { instr, argument } => {
                let mut bytes = vec![instr.opcode];
                bytes.extend(argument);
                bytes
            }
            Self::Data(data) => data.clone(),
            _ => Vec::new(),
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }

        if line.starts_with(COMMENT_CHAR) {
            return Ok(Self::Comment(line.to_string()));
        }

        if let Some(address) = line
            .strip_prefix(ORIGIN_PREFIX)
            .and_then(|rest| rest.strip_suffix(ORIGIN_SUFFIX))
        {
            return util::parse_hex_byte(address)
                .map(Self::Origin)
                .ok_or_else(|| Error::InvalidAddress(address.to_string()));
        }

        let (mnemonic, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(mnemonic, rest)| (mnemonic, rest.trim()));

        // A one byte mnemonic followed by anything else is left for the data scan
        if let Some(instr) = instructions::from_mnemonic(mnemonic) {
            if instr.has_argument() || rest.is_empty() {
                return Self::parse_instruction(instr, rest);
            }
        }

        let data = Self::scan_data(line);
        if !data.is_empty() {
            return Ok(Self::Data(data));
        }

        if HELP_TOKENS.contains(&line.to_lowercase().as_str()) {
            Ok(Self::Help)
        } else if line == util::QUIT_TOKEN {
            Ok(Self::Quit)
        } else {
            Err(Error::InvalidInstruction(line.to_string()))
        }
    }

    fn parse_instruction(instr: &'static Instruction, argument: &str) -> Result<Self> {
        if !instr.has_argument() {
            return Ok(Self::Instruction {
                instr,
                argument: None,
            });
        }

        util::parse_hex_byte(argument)
            .map(|value| Self::Instruction {
                instr,
                argument: Some(value),
            })
            .ok_or_else(|| Error::InvalidArgument {
                mnemonic: instr.name,
                argument: argument.to_string(),
            })
    }

    /// Collect every `0xXX` token in the line, ignoring whatever is around them.
    fn scan_data(line: &str) -> Vec<u8> {
        let mut data = Vec::new();
        let mut rest = line;

        while let Some(position) = rest.find(DATA_PREFIX) {
            rest = &rest[position + DATA_PREFIX.len()..];
            let digits: String = rest
                .chars()
                .take_while(|c| c.is_ascii_hexdigit())
                .take(2)
                .collect();

            if let Ok(value) = u8::from_str_radix(&digits, 16) {
                data.push(value);
            }
            rest = &rest[digits.len()..];
        }

        data
    }
}

/// A statement together with the address it was assembled at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub address: u16,
    pub statement: Statement,
}

/// Assembles lines one after another at an advancing cursor.
#[derive(Debug, Clone)]
pub struct Assembler {
    cursor: u16,
}

impl Assembler {
    pub const fn new(cursor: u8) -> Self {
        Self {
            cursor: cursor as u16,
        }
    }

    /// Next address to be written. Goes one past the last byte once memory is full.
    pub const fn cursor(&self) -> u16 {
        self.cursor
    }

    pub const fn is_exhausted(&self) -> bool {
        self.cursor >= Memory::SIZE as u16
    }

    /// Assemble a single line into memory. Memory is only touched if the whole
    /// statement fits.
    pub fn assemble(&mut self, line: &str, memory: &mut Memory) -> Result<Assembled> {
        let statement = Statement::parse(line)?;
        let address = self.cursor;

        match &statement {
            Statement::Origin(origin) => self.cursor = *origin as u16,

            Statement::Instruction { .. } | Statement::Data(_) => {
                let bytes = statement.bytes();
                if address as usize + bytes.len() > Memory::SIZE {
                    return Err(Error::OutOfMemorySpace);
                }

                for (offset, byte) in bytes.iter().enumerate() {
                    memory[(address as usize + offset) as u8] = *byte;
                }
                self.cursor += bytes.len() as u16;
            }

            _ => {}
        }

        Ok(Assembled { address, statement })
    }
}
