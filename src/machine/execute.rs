use super::{AluOp, DISPLAY_HEIGHT, DISPLAY_WIDTH, Instruction, Machine, glyph_address};
use crate::u4;

use super::cycle::INSTRUCTION_WIDTH;

const FLAG: u4 = u4::MAX;

impl Machine {
    /// Applies one decoded instruction. The program counter already points at
    /// the following word.
    pub(crate) fn execute(&mut self, instruction: Instruction) {
        match instruction {
            Instruction::ClearDisplay => {
                self.framebuffer.fill(0);
            }
            Instruction::Return => {
                self.pc = self.pop();
            }
            Instruction::Jump { nnn } => {
                self.pc = nnn.into();
            }
            Instruction::JumpWithOffset { nnn } => {
                self.pc = u16::from(nnn).wrapping_add(self.v[0].into());
            }
            Instruction::Call { nnn } => {
                self.push(self.pc);
                self.pc = nnn.into();
            }
            Instruction::SkipRegEqualImm { x, kk } => {
                self.skip_if(self.v[x] == kk);
            }
            Instruction::SkipRegNotEqualImm { x, kk } => {
                self.skip_if(self.v[x] != kk);
            }
            Instruction::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Instruction::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Instruction::SetRegImm { x, kk } => {
                self.v[x] = kk;
            }
            Instruction::AddRegImm { x, kk } => {
                self.v[x] = self.v[x].wrapping_add(kk);
            }
            Instruction::Alu { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Instruction::SetIndexImm { nnn } => {
                self.i = nnn.into();
            }
            Instruction::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Instruction::FontChar { x } => {
                self.i = glyph_address(self.v[x]);
            }
            Instruction::Bcd { x } => {
                let value = self.v[x];
                *self.mem_mut(self.i) = value / 100;
                *self.mem_mut(self.i.wrapping_add(1)) = (value / 10) % 10;
                *self.mem_mut(self.i.wrapping_add(2)) = value % 10;
            }
            Instruction::StoreRegs { x } => {
                for reg in 0..=u8::from(x) {
                    *self.mem_mut(self.i.wrapping_add(reg.into())) = self.v[reg as usize];
                }
            }
            Instruction::LoadRegs { x } => {
                for reg in 0..=u8::from(x) {
                    self.v[reg as usize] = self.mem(self.i.wrapping_add(reg.into()));
                }
            }
            Instruction::Random { x, kk } => {
                self.v[x] = self.random.next_byte() & kk;
            }
            Instruction::Draw { x, y, n } => {
                self.execute_draw(x, y, n);
            }
            Instruction::SkipIfPressed { x } => {
                self.skip_if(self.key_pressed(self.v[x]));
            }
            Instruction::SkipIfNotPressed { x } => {
                self.skip_if(!self.key_pressed(self.v[x]));
            }
            Instruction::WaitForKey { x } => {
                self.execute_wait_for_key(x);
            }
            Instruction::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Instruction::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Instruction::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
            }
        }
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(INSTRUCTION_WIDTH);
        }
    }

    fn key_pressed(&self, key: u8) -> bool {
        self.keypad[u4::wrapping(key)]
    }

    /// Operands are read before any write; the flag is written last, so with
    /// x = F the flag replaces the arithmetic result.
    fn execute_alu(&mut self, x: u4, y: u4, op: AluOp) {
        let vx = self.v[x];
        let vy = self.v[y];

        match op {
            AluOp::Set => self.v[x] = vy,
            AluOp::Or => self.v[x] = vx | vy,
            AluOp::And => self.v[x] = vx & vy,
            AluOp::Xor => self.v[x] = vx ^ vy,
            AluOp::Add => {
                let (res, carry) = vx.overflowing_add(vy);
                self.v[x] = res;
                self.v[FLAG] = carry as u8;
            }
            AluOp::Sub => {
                self.v[x] = vx.wrapping_sub(vy);
                // Set only on a strict "no borrow"; equal operands clear it
                self.v[FLAG] = (vx > vy) as u8;
            }
            AluOp::SubReverse => {
                self.v[x] = vy.wrapping_sub(vx);
                self.v[FLAG] = (vy > vx) as u8;
            }
            AluOp::ShiftRight => {
                self.v[x] = vx >> 1;
                self.v[FLAG] = vx & 0x01;
            }
            AluOp::ShiftLeft => {
                self.v[x] = vx << 1;
                self.v[FLAG] = vx >> 7;
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) {
        let x_pos = self.v[x] as usize;
        let y_pos = self.v[y] as usize;

        self.v[FLAG] = 0;

        for row in 0..usize::from(n) {
            let sprite_byte = self.mem(self.i.wrapping_add(row as u16));

            for col in 0..8 {
                if sprite_byte & (0x80 >> col) == 0 {
                    continue;
                }

                // Sprites wrap around the display edges
                let px = (x_pos + col) % DISPLAY_WIDTH;
                let py = (y_pos + row) % DISPLAY_HEIGHT;
                let pixel = &mut self.framebuffer[px + py * DISPLAY_WIDTH];

                if *pixel == 1 {
                    self.v[FLAG] = 1;
                }
                *pixel ^= 1;
            }
        }
    }

    fn execute_wait_for_key(&mut self, x: u4) {
        match self.keypad.iter().position(|&pressed| pressed) {
            Some(key) => self.v[x] = key as u8,
            // Run this instruction again on the next cycle
            None => self.pc = self.pc.wrapping_sub(INSTRUCTION_WIDTH),
        }
    }
}
