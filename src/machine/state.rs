use super::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, Framebuffer,
    RandomSource, ThreadRandom,
};
use crate::u4;

pub const PROGRAM_START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;
pub const STACK_SIZE: usize = 16;
/// Largest program image that fits between the entry address and the end of memory.
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START_ADDRESS;

/// Mask applied to every address before it touches memory.
pub(crate) const ADDRESS_MASK: u16 = (MEMORY_SIZE - 1) as u16;

/// Virtual machine state.
pub struct Machine {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// 64x32 monochrome pixels, row-major
    pub(crate) framebuffer: Framebuffer,

    /// Program counter: address of the next instruction to fetch
    pub(crate) pc: u16,
    /// Index register. Kept at full 16-bit width, masked on memory access
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF doubles as the flag register)
    pub(crate) v: [u8; 16],

    /// Return addresses; `sp` is the next free slot and wraps mod 16
    pub(crate) stack: [u16; STACK_SIZE],
    pub(crate) sp: u8,
    /// Live return addresses, saturating at `STACK_SIZE` when calls overflow
    pub(crate) depth: u8,

    pub(crate) delay_timer: u8,
    pub(crate) sound_timer: u8,

    /// Keypad state: true = pressed
    pub(crate) keypad: [bool; 16],

    pub(crate) random: Box<dyn RandomSource>,
}

impl Machine {
    /// Creates an initialized machine drawing random bytes from the thread RNG.
    pub fn new() -> Self {
        Self::with_random(Box::new(ThreadRandom))
    }

    /// Creates an initialized machine with an injected random source.
    pub fn with_random(random: Box<dyn RandomSource>) -> Self {
        let mut machine = Machine {
            memory: [0; MEMORY_SIZE],
            framebuffer: [0; DISPLAY_WIDTH * DISPLAY_HEIGHT],
            pc: 0,
            i: 0,
            v: [0; 16],
            stack: [0; STACK_SIZE],
            sp: 0,
            depth: 0,
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            random,
        };
        machine.reset();
        machine
    }

    /// Returns the machine to its power-on state. Memory above the glyph table
    /// is cleared, so any loaded program has to be loaded again.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        self.framebuffer = [0; DISPLAY_WIDTH * DISPLAY_HEIGHT];

        self.pc = PROGRAM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack = [0; STACK_SIZE];
        self.sp = 0;
        self.depth = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.keypad = [false; 16];

        tracing::debug!("machine reset");
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    /// Returns a copy of the framebuffer.
    pub fn framebuffer(&self) -> Framebuffer {
        self.framebuffer
    }

    /// Get the state of a pixel on the display (true = on).
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.framebuffer[(y % DISPLAY_HEIGHT) * DISPLAY_WIDTH + x % DISPLAY_WIDTH] != 0
    }

    /// Returns true while the sound timer is running.
    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn register(&self, x: u4) -> u8 {
        self.v[x]
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    /// Return addresses currently on the stack, oldest first.
    ///
    /// Holds at most sixteen entries; deeper calls overwrite the oldest one.
    pub fn call_stack(&self) -> Vec<u16> {
        let oldest = self.sp as usize + STACK_SIZE - self.depth as usize;
        (0..self.depth as usize)
            .map(|n| self.stack[(oldest + n) % STACK_SIZE])
            .collect()
    }

    pub fn keypad(&self) -> &[bool; 16] {
        &self.keypad
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    /// Reads the big-endian word at `addr`, wrapping at the end of memory.
    pub fn word_at(&self, addr: u16) -> u16 {
        let high = self.memory[(addr & ADDRESS_MASK) as usize];
        let low = self.memory[(addr.wrapping_add(1) & ADDRESS_MASK) as usize];
        u16::from_be_bytes([high, low])
    }

    pub fn set_register(&mut self, x: u4, value: u8) {
        self.v[x] = value;
    }

    pub fn set_index(&mut self, value: u16) {
        self.i = value;
    }

    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    pub fn set_delay_timer(&mut self, value: u8) {
        self.delay_timer = value;
    }

    pub fn set_sound_timer(&mut self, value: u8) {
        self.sound_timer = value;
    }

    pub(crate) fn mem(&self, addr: u16) -> u8 {
        self.memory[(addr & ADDRESS_MASK) as usize]
    }

    pub(crate) fn mem_mut(&mut self, addr: u16) -> &mut u8 {
        &mut self.memory[(addr & ADDRESS_MASK) as usize]
    }

    pub(crate) fn push(&mut self, addr: u16) {
        self.stack[self.sp as usize] = addr;
        self.sp = (self.sp + 1) % STACK_SIZE as u8;
        self.depth = (self.depth + 1).min(STACK_SIZE as u8);
    }

    pub(crate) fn pop(&mut self) -> u16 {
        self.sp = (self.sp + STACK_SIZE as u8 - 1) % STACK_SIZE as u8;
        self.depth = self.depth.saturating_sub(1);
        self.stack[self.sp as usize]
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
