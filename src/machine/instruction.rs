use std::fmt;

use crate::{u4, u12};

/// Decoded instructions.
///
/// The fields (x, y, n, kk, nnn) correspond to the operands encoded in the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0 - Clear the display.
    ClearDisplay,
    /// 00EE - Return from a subroutine.
    Return,

    /// 1nnn - Jump to location nnn.
    Jump { nnn: u12 },
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset { nnn: u12 },
    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u12 },

    /// 3xkk - Skip next instruction if Vx == kk.
    SkipRegEqualImm { x: u4, kk: u8 },
    /// 4xkk - Skip next instruction if Vx != kk.
    SkipRegNotEqualImm { x: u4, kk: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6xkk - Set Vx = kk.
    SetRegImm { x: u4, kk: u8 },
    /// 7xkk - Set Vx = Vx + kk, no carry.
    AddRegImm { x: u4, kk: u8 },

    /// 8xyN - Register to register arithmetic.
    Alu { x: u4, y: u4, op: AluOp },

    /// Annn - Set I = nnn.
    SetIndexImm { nnn: u12 },
    /// Fx1E - Set I = I + Vx.
    AddIndexReg { x: u4 },
    /// Fx29 - Set I = location of the glyph for digit Vx.
    FontChar { x: u4 },
    /// Fx33 - Store the decimal digits of Vx at I, I+1 and I+2.
    Bcd { x: u4 },
    /// Fx55 - Store V0 through Vx in memory starting at I.
    StoreRegs { x: u4 },
    /// Fx65 - Read V0 through Vx from memory starting at I.
    LoadRegs { x: u4 },

    /// Cxkk - Set Vx = random byte AND kk.
    Random { x: u4, kk: u8 },

    /// Dxyn - Draw an n-byte sprite from I at (Vx, Vy), VF = collision.
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip next instruction if key Vx is pressed.
    SkipIfPressed { x: u4 },
    /// ExA1 - Skip next instruction if key Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// Fx0A - Wait for a key press, store the key in Vx.
    WaitForKey { x: u4 },

    /// Fx07 - Set Vx = delay timer.
    ReadDelayTimer { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },
}

/// Operations of the 8xyN family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    /// 8xy0 - Vx = Vy
    Set,
    /// 8xy1 - Vx = Vx OR Vy
    Or,
    /// 8xy2 - Vx = Vx AND Vy
    And,
    /// 8xy3 - Vx = Vx XOR Vy
    Xor,
    /// 8xy4 - Vx = Vx + Vy, VF = carry
    Add,
    /// 8xy5 - Vx = Vx - Vy, VF = Vx > Vy
    Sub,
    /// 8xy6 - Vx = Vx SHR 1, VF = bit shifted out
    ShiftRight,
    /// 8xy7 - Vx = Vy - Vx, VF = Vy > Vx
    SubReverse,
    /// 8xyE - Vx = Vx SHL 1, VF = bit shifted out
    ShiftLeft,
}

impl Instruction {
    /// Classifies a 16-bit word. Returns `None` for words outside the opcode table.
    pub fn decode(word: u16) -> Option<Self> {
        let nibble = (
            ((word & 0xF000) >> 12) as u8,
            ((word & 0x0F00) >> 8) as u8,
            ((word & 0x00F0) >> 4) as u8,
            (word & 0x000F) as u8,
        );

        let x = u4::new(nibble.1);
        let y = u4::new(nibble.2);
        let n = u4::new(nibble.3);
        let kk = (word & 0x00FF) as u8;
        let nnn = u12::wrapping(word);

        let instruction = match nibble {
            (0x0, 0x0, 0xE, 0x0) => Instruction::ClearDisplay,
            (0x0, 0x0, 0xE, 0xE) => Instruction::Return,
            (0x1, _, _, _) => Instruction::Jump { nnn },
            (0x2, _, _, _) => Instruction::Call { nnn },
            (0x3, _, _, _) => Instruction::SkipRegEqualImm { x, kk },
            (0x4, _, _, _) => Instruction::SkipRegNotEqualImm { x, kk },
            (0x5, _, _, 0x0) => Instruction::SkipRegEqualReg { x, y },
            (0x6, _, _, _) => Instruction::SetRegImm { x, kk },
            (0x7, _, _, _) => Instruction::AddRegImm { x, kk },
            (0x8, _, _, op) => Instruction::Alu {
                x,
                y,
                op: match op {
                    0x0 => AluOp::Set,
                    0x1 => AluOp::Or,
                    0x2 => AluOp::And,
                    0x3 => AluOp::Xor,
                    0x4 => AluOp::Add,
                    0x5 => AluOp::Sub,
                    0x6 => AluOp::ShiftRight,
                    0x7 => AluOp::SubReverse,
                    0xE => AluOp::ShiftLeft,
                    _ => return None,
                },
            },
            (0x9, _, _, 0x0) => Instruction::SkipRegNotEqualReg { x, y },
            (0xA, _, _, _) => Instruction::SetIndexImm { nnn },
            (0xB, _, _, _) => Instruction::JumpWithOffset { nnn },
            (0xC, _, _, _) => Instruction::Random { x, kk },
            (0xD, _, _, _) => Instruction::Draw { x, y, n },
            (0xE, _, 0x9, 0xE) => Instruction::SkipIfPressed { x },
            (0xE, _, 0xA, 0x1) => Instruction::SkipIfNotPressed { x },
            (0xF, _, 0x0, 0x7) => Instruction::ReadDelayTimer { x },
            (0xF, _, 0x0, 0xA) => Instruction::WaitForKey { x },
            (0xF, _, 0x1, 0x5) => Instruction::SetDelayTimer { x },
            (0xF, _, 0x1, 0x8) => Instruction::SetSoundTimer { x },
            (0xF, _, 0x1, 0xE) => Instruction::AddIndexReg { x },
            (0xF, _, 0x2, 0x9) => Instruction::FontChar { x },
            (0xF, _, 0x3, 0x3) => Instruction::Bcd { x },
            (0xF, _, 0x5, 0x5) => Instruction::StoreRegs { x },
            (0xF, _, 0x6, 0x5) => Instruction::LoadRegs { x },

            _ => return None,
        };

        Some(instruction)
    }
}

/// Formats the instruction as an assembler mnemonic, e.g. `LD V3, 0x2A`.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::ClearDisplay => write!(f, "CLS"),
            Instruction::Return => write!(f, "RET"),
            Instruction::Jump { nnn } => write!(f, "JP 0x{nnn}"),
            Instruction::JumpWithOffset { nnn } => write!(f, "JP V0, 0x{nnn}"),
            Instruction::Call { nnn } => write!(f, "CALL 0x{nnn}"),
            Instruction::SkipRegEqualImm { x, kk } => write!(f, "SE V{x}, 0x{kk:02X}"),
            Instruction::SkipRegNotEqualImm { x, kk } => write!(f, "SNE V{x}, 0x{kk:02X}"),
            Instruction::SkipRegEqualReg { x, y } => write!(f, "SE V{x}, V{y}"),
            Instruction::SkipRegNotEqualReg { x, y } => write!(f, "SNE V{x}, V{y}"),
            Instruction::SetRegImm { x, kk } => write!(f, "LD V{x}, 0x{kk:02X}"),
            Instruction::AddRegImm { x, kk } => write!(f, "ADD V{x}, 0x{kk:02X}"),
            Instruction::Alu { x, y, op } => {
                let mnemonic = match op {
                    AluOp::Set => "LD",
                    AluOp::Or => "OR",
                    AluOp::And => "AND",
                    AluOp::Xor => "XOR",
                    AluOp::Add => "ADD",
                    AluOp::Sub => "SUB",
                    AluOp::ShiftRight => "SHR",
                    AluOp::SubReverse => "SUBN",
                    AluOp::ShiftLeft => "SHL",
                };
                match op {
                    AluOp::ShiftRight | AluOp::ShiftLeft => write!(f, "{mnemonic} V{x}"),
                    _ => write!(f, "{mnemonic} V{x}, V{y}"),
                }
            }
            Instruction::SetIndexImm { nnn } => write!(f, "LD I, 0x{nnn}"),
            Instruction::AddIndexReg { x } => write!(f, "ADD I, V{x}"),
            Instruction::FontChar { x } => write!(f, "LD F, V{x}"),
            Instruction::Bcd { x } => write!(f, "LD B, V{x}"),
            Instruction::StoreRegs { x } => write!(f, "LD [I], V{x}"),
            Instruction::LoadRegs { x } => write!(f, "LD V{x}, [I]"),
            Instruction::Random { x, kk } => write!(f, "RND V{x}, 0x{kk:02X}"),
            Instruction::Draw { x, y, n } => write!(f, "DRW V{x}, V{y}, {}", n.get()),
            Instruction::SkipIfPressed { x } => write!(f, "SKP V{x}"),
            Instruction::SkipIfNotPressed { x } => write!(f, "SKNP V{x}"),
            Instruction::WaitForKey { x } => write!(f, "LD V{x}, K"),
            Instruction::ReadDelayTimer { x } => write!(f, "LD V{x}, DT"),
            Instruction::SetDelayTimer { x } => write!(f, "LD DT, V{x}"),
            Instruction::SetSoundTimer { x } => write!(f, "LD ST, V{x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_operand_fields() {
        assert_eq!(
            Instruction::decode(0xD12F),
            Some(Instruction::Draw {
                x: u4::new(1),
                y: u4::new(2),
                n: u4::new(0xF)
            })
        );
        assert_eq!(
            Instruction::decode(0x2ABC),
            Some(Instruction::Call {
                nnn: u12::new(0xABC)
            })
        );
        assert_eq!(
            Instruction::decode(0x7E80),
            Some(Instruction::AddRegImm {
                x: u4::new(0xE),
                kk: 0x80
            })
        );
    }

    #[test]
    fn trailing_nibbles_select_within_ambiguous_classes() {
        assert_eq!(Instruction::decode(0x00E0), Some(Instruction::ClearDisplay));
        assert_eq!(Instruction::decode(0x00EE), Some(Instruction::Return));
        assert!(matches!(
            Instruction::decode(0x8016),
            Some(Instruction::Alu {
                op: AluOp::ShiftRight,
                ..
            })
        ));
        assert!(matches!(
            Instruction::decode(0x801E),
            Some(Instruction::Alu {
                op: AluOp::ShiftLeft,
                ..
            })
        ));
        assert!(matches!(
            Instruction::decode(0xE3A1),
            Some(Instruction::SkipIfNotPressed { .. })
        ));
        assert!(matches!(
            Instruction::decode(0xF565),
            Some(Instruction::LoadRegs { .. })
        ));
    }

    #[test]
    fn words_outside_the_table_are_rejected() {
        for word in [
            0x0000, 0x00E1, 0x0123, 0x5121, 0x8008, 0x800F, 0x9001, 0xE09F, 0xE0A2, 0xF000,
            0xF0FF, 0xF130,
        ] {
            assert_eq!(Instruction::decode(word), None, "{word:#06X}");
        }
    }

    #[test]
    fn every_top_nibble_has_a_form() {
        let representative = [
            0x00E0, 0x1000, 0x2000, 0x3000, 0x4000, 0x5000, 0x6000, 0x7000, 0x8000, 0x9000,
            0xA000, 0xB000, 0xC000, 0xD000, 0xE09E, 0xF007,
        ];
        for word in representative {
            assert!(Instruction::decode(word).is_some(), "{word:#06X}");
        }
    }

    #[test]
    fn disassembly() {
        let text = |word| Instruction::decode(word).unwrap().to_string();

        assert_eq!(text(0x00E0), "CLS");
        assert_eq!(text(0x1234), "JP 0x234");
        assert_eq!(text(0x632A), "LD V3, 0x2A");
        assert_eq!(text(0x8AB4), "ADD VA, VB");
        assert_eq!(text(0x8A06), "SHR VA");
        assert_eq!(text(0xD125), "DRW V1, V2, 5");
        assert_eq!(text(0xF00A), "LD V0, K");
        assert_eq!(text(0xFF55), "LD [I], VF");
    }
}
