/// Address of the first glyph in memory.
pub const FONT_START_ADDRESS: usize = 0x50;
/// Bytes per glyph; every glyph is 4 pixels wide and 5 rows tall.
pub const GLYPH_SIZE: usize = 5;
pub const FONT_END_ADDRESS: usize = FONT_START_ADDRESS + FONT.len();

/// Built-in hexadecimal digit glyphs 0-F.
pub const FONT: [u8; 16 * GLYPH_SIZE] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Address of the glyph for the low nibble of `digit`.
pub fn glyph_address(digit: u8) -> u16 {
    (FONT_START_ADDRESS + (digit & 0x0F) as usize * GLYPH_SIZE) as u16
}
