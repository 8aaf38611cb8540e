use std::path::PathBuf;

/// Everything the debugger can reject. None of these are fatal to a session, the
/// controller turns each one into a single log entry.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid value '{0}'")]
    InvalidValue(String),

    #[error("invalid register '{0}'")]
    InvalidRegister(String),

    #[error("'{0}' invalid instruction")]
    InvalidInstruction(String),

    #[error("invalid argument '{argument}' provided for '{mnemonic}' instruction")]
    InvalidArgument {
        mnemonic: &'static str,
        argument: String,
    },

    #[error("invalid breakpoint number '{0}'")]
    InvalidBreakpointSlot(String),

    #[error("breakpoint {0} not set")]
    BreakpointNotSet(usize),

    #[error("breakpoint at address 0x{0:02x} was already set")]
    BreakpointDuplicate(u8),

    #[error("no free breakpoint slot for address 0x{0:02x}")]
    BreakpointCapacityExceeded(u8),

    #[error("invalid clock speed '{0}'")]
    InvalidClockSpeed(String),

    #[error("file '{}' not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("can't read file '{}'", .0.display())]
    FileUnreadable(PathBuf),

    #[error("can't write file '{}'", .0.display())]
    FileUnwritable(PathBuf),

    #[error("file '{}' already exists", .0.display())]
    FileAlreadyExists(PathBuf),

    #[error("not enough memory space available")]
    OutOfMemorySpace,
}

pub type Result<T> = std::result::Result<T, Error>;
