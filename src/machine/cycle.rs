use super::{Instruction, Machine, UnrecognizedInstruction};

/// Width of one instruction word in bytes.
pub(crate) const INSTRUCTION_WIDTH: u16 = 2;

impl Machine {
    /// Executes a single cycle: fetch, advance the program counter, decode,
    /// execute, then count both timers down.
    ///
    /// The timers tick even when the word is unrecognized; the error leaves the
    /// program counter pointing past the offending word.
    pub fn cycle(&mut self) -> Result<(), UnrecognizedInstruction> {
        let address = self.pc;
        let word = self.word_at(address);
        self.pc = self.pc.wrapping_add(INSTRUCTION_WIDTH);

        let result = match Instruction::decode(word) {
            Some(instruction) => {
                tracing::trace!(address, word, %instruction, "execute");
                self.execute(instruction);
                Ok(())
            }
            None => Err(UnrecognizedInstruction {
                opcode: word,
                address,
            }),
        };

        self.tick_timers();
        result
    }

    fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u4;

    fn machine_with(program: &[u8]) -> Machine {
        let mut machine = Machine::new();
        machine.load_program(program).unwrap();
        machine
    }

    #[test]
    fn clear_then_advance() {
        let mut machine = machine_with(&[0x00, 0xE0]);
        machine.cycle().unwrap();

        assert!(machine.framebuffer().iter().all(|&p| p == 0));
        assert_eq!(machine.pc(), 0x202);
    }

    #[test]
    fn unrecognized_word_advances_and_reports() {
        let mut machine = machine_with(&[0xFF, 0xFF, 0x60, 0x01]);
        machine.set_delay_timer(3);

        let err = machine.cycle().unwrap_err();

        assert_eq!(
            err,
            UnrecognizedInstruction {
                opcode: 0xFFFF,
                address: 0x200
            }
        );
        assert_eq!(machine.pc(), 0x202);
        assert_eq!(machine.delay_timer(), 2);
        assert_eq!(machine.registers(), &[0; 16]);

        // The host may keep going
        machine.cycle().unwrap();
        assert_eq!(machine.register(u4::new(0)), 1);
    }

    #[test]
    fn timers_count_down_to_zero() {
        // 1200: jump to self
        let mut machine = machine_with(&[0x12, 0x00]);
        machine.set_delay_timer(5);
        machine.set_sound_timer(2);

        for _ in 0..5 {
            machine.cycle().unwrap();
        }
        assert_eq!(machine.delay_timer(), 0);
        assert_eq!(machine.sound_timer(), 0);
        assert!(!machine.sound_active());

        machine.cycle().unwrap();
        assert_eq!(machine.delay_timer(), 0);
    }

    #[test]
    fn timer_written_this_cycle_is_decremented_once() {
        // 6005: V0 = 5, F015: DT = V0
        let mut machine = machine_with(&[0x60, 0x05, 0xF0, 0x15]);
        machine.cycle().unwrap();
        machine.cycle().unwrap();

        assert_eq!(machine.delay_timer(), 4);
    }

    #[test]
    fn fetch_wraps_program_counter_into_memory() {
        let mut machine = Machine::new();
        machine.memory[0x202] = 0x61;
        machine.memory[0x203] = 0x07;
        machine.set_pc(0x1202);

        machine.cycle().unwrap();
        assert_eq!(machine.register(u4::new(1)), 7);
        assert_eq!(machine.pc(), 0x1204);
    }
}
