use std::{fs::File, io::Read, path::Path};

use super::{LoadError, MAX_PROGRAM_SIZE, Machine, PROGRAM_START_ADDRESS};

impl Machine {
    /// Copies a raw program image into memory at the entry address.
    ///
    /// Nothing is written if the image does not fit.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), LoadError> {
        let program_end = PROGRAM_START_ADDRESS + program.len();
        self.memory
            .get_mut(PROGRAM_START_ADDRESS..program_end)
            .ok_or(LoadError::TooLarge {
                size: program.len(),
                max_size: MAX_PROGRAM_SIZE,
            })?
            .copy_from_slice(program);

        tracing::debug!(size = program.len(), "program loaded");
        Ok(())
    }

    /// Reads a whole program image from `reader` and loads it.
    pub fn load_program_from<R: Read>(&mut self, mut reader: R) -> Result<(), LoadError> {
        let mut program = Vec::new();
        reader.read_to_end(&mut program)?;
        self.load_program(&program)
    }

    /// Reads a program image from a file and loads it.
    pub fn load_program_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let file = File::open(path)?;
        self.load_program_from(file)
    }
}
