//! Loading and saving programs.

use crate::{
    cpu::Memory,
    error::{Error, Result},
};
use std::{
    fs,
    io::{self, Write},
    path::Path,
};

/// The program written back into memory on every reset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ProgramImage {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a binary image from disk. Does not touch the machine.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path).map_err(|err| {
            tracing::debug!("failed to read \"{}\": {}", path.display(), err);
            Error::FileUnreadable(path.to_path_buf())
        })?;

        Ok(Self::new(path.display().to_string(), bytes))
    }

    /// Images longer than the address space only get their first 256 bytes loaded.
    pub fn is_oversized(&self) -> bool {
        self.bytes.len() > Memory::SIZE
    }

    /// The part of the image that ends up in memory.
    pub fn loadable(&self) -> &[u8] {
        &self.bytes[..self.bytes.len().min(Memory::SIZE)]
    }
}

/// Read an assembly source file.
pub fn read_source(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    fs::read_to_string(path).map_err(|err| {
        tracing::debug!("failed to read \"{}\": {}", path.display(), err);
        Error::FileUnreadable(path.to_path_buf())
    })
}

/// Write memory from address 0 up to and including `end` to a new file.
pub fn save(memory: &Memory, end: u8, path: &Path) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => Error::FileAlreadyExists(path.to_path_buf()),
            _ => Error::FileUnwritable(path.to_path_buf()),
        })?;

    file.write_all(&memory.as_slice()[..=end as usize])
        .map_err(|_| Error::FileUnwritable(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Machine;

    #[test]
    fn save_then_load_round_trip() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("program.kris");

        let mut memory = Memory::default();
        memory.load(&[0x20, 0x41, 0x14, 0x13, 0x0F, 0x99]);

        save(&memory, 0x04, &path).unwrap();
        let image = ProgramImage::load(&path).unwrap();
        assert_eq!(image.bytes, vec![0x20, 0x41, 0x14, 0x13, 0x0F]);

        let machine = Machine::with_program(image.loadable());
        assert_eq!(&machine.memory.as_slice()[..5], &memory.as_slice()[..5]);
    }

    #[test]
    fn save_full_memory() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("full.kris");

        save(&Memory::default(), 0xFF, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), Memory::SIZE);
    }

    #[test]
    fn save_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("existing.kris");
        fs::write(&path, b"keep me").unwrap();

        assert_eq!(
            save(&Memory::default(), 0x10, &path),
            Err(Error::FileAlreadyExists(path.clone()))
        );
        assert_eq!(fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn missing_files() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("nope.kris");

        assert_eq!(
            ProgramImage::load(&path),
            Err(Error::FileNotFound(path.clone()))
        );
        assert_eq!(read_source(&path), Err(Error::FileNotFound(path)));
    }

    #[test]
    fn oversized_images_are_truncated() {
        let image = ProgramImage::new("big", vec![0x10; 300]);
        assert!(image.is_oversized());
        assert_eq!(image.loadable().len(), Memory::SIZE);
        assert!(!ProgramImage::new("small", vec![0x10; 3]).is_oversized());
    }
}
