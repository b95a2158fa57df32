pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Framebuffer snapshot: one `u32` per pixel (0 = off, 1 = on), row-major,
/// indexed by `x + y * DISPLAY_WIDTH`.
pub type Framebuffer = [u32; DISPLAY_WIDTH * DISPLAY_HEIGHT];

/// Errors raised while installing a program image.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read program image")]
    Io(#[from] std::io::Error),

    #[error("Program is too large ({size} bytes), max size is {max_size} bytes")]
    TooLarge { size: usize, max_size: usize },
}

/// The decode step found no opcode matching the fetched word.
///
/// The program counter has already moved past the word when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized instruction {opcode:#06X} at address {address:#05X}")]
pub struct UnrecognizedInstruction {
    pub opcode: u16,
    pub address: u16,
}
