use chip8_vm::{
    machine::{Instruction, Machine, RandomSource},
    u4,
};
use proptest::prelude::*;

struct Fixed(u8);

impl RandomSource for Fixed {
    fn next_byte(&mut self) -> u8 {
        self.0
    }
}

fn machine_with_word(word: u16, regs: [u8; 16], keys: u16) -> Machine {
    let mut machine = Machine::with_random(Box::new(Fixed(0x5A)));
    machine.load_program(&word.to_be_bytes()).unwrap();
    for (idx, value) in regs.into_iter().enumerate() {
        machine.set_register(u4::new(idx as u8), value);
    }
    for key in 0..16u8 {
        machine.set_key(u4::new(key), keys & (1 << key) != 0);
    }
    machine
}

fn skip_word() -> impl Strategy<Value = u16> {
    prop_oneof![
        (0u16..0x1000).prop_map(|low| 0x3000 | low),
        (0u16..0x1000).prop_map(|low| 0x4000 | low),
        (0u16..0x100).prop_map(|xy| 0x5000 | xy << 4),
        (0u16..0x100).prop_map(|xy| 0x9000 | xy << 4),
        (0u16..0x10).prop_map(|x| 0xE09E | x << 8),
        (0u16..0x10).prop_map(|x| 0xE0A1 | x << 8),
    ]
}

proptest! {
    #[test]
    fn skips_advance_by_two_or_four(
        word in skip_word(),
        regs in any::<[u8; 16]>(),
        keys in any::<u16>(),
    ) {
        let mut machine = machine_with_word(word, regs, keys);
        machine.cycle().unwrap();

        let advance = machine.pc() - 0x200;
        prop_assert!(advance == 2 || advance == 4, "{word:#06X} advanced by {advance}");
    }

    #[test]
    fn add_sets_carry_iff_sum_overflows(a in any::<u8>(), b in any::<u8>()) {
        let mut regs = [0; 16];
        regs[0] = a;
        regs[1] = b;
        let mut machine = machine_with_word(0x8014, regs, 0);
        machine.cycle().unwrap();

        prop_assert_eq!(machine.register(u4::new(0)), a.wrapping_add(b));
        prop_assert_eq!(machine.register(u4::MAX), (a as u16 + b as u16 > 0xFF) as u8);
    }

    #[test]
    fn sub_flags_follow_strict_comparison(a in any::<u8>(), b in any::<u8>()) {
        let mut regs = [0; 16];
        regs[0] = a;
        regs[1] = b;

        let mut machine = machine_with_word(0x8015, regs, 0);
        machine.cycle().unwrap();
        prop_assert_eq!(machine.register(u4::new(0)), a.wrapping_sub(b));
        prop_assert_eq!(machine.register(u4::MAX), (a > b) as u8);

        let mut machine = machine_with_word(0x8017, regs, 0);
        machine.cycle().unwrap();
        prop_assert_eq!(machine.register(u4::new(0)), b.wrapping_sub(a));
        prop_assert_eq!(machine.register(u4::MAX), (b > a) as u8);
    }

    #[test]
    fn timers_never_increase_without_writes(
        delay in any::<u8>(),
        sound in any::<u8>(),
        cycles in 0usize..300,
    ) {
        // JP 0x200
        let mut machine = machine_with_word(0x1200, [0; 16], 0);
        machine.set_delay_timer(delay);
        machine.set_sound_timer(sound);

        let mut last = (delay, sound);
        for _ in 0..cycles {
            machine.cycle().unwrap();
            let now = (machine.delay_timer(), machine.sound_timer());
            prop_assert_eq!(now.0, last.0.saturating_sub(1));
            prop_assert_eq!(now.1, last.1.saturating_sub(1));
            last = now;
        }
    }

    #[test]
    fn any_word_keeps_state_in_bounds(word in any::<u16>(), regs in any::<[u8; 16]>(), keys in any::<u16>()) {
        let mut machine = machine_with_word(word, regs, keys);
        let result = machine.cycle();

        prop_assert_eq!(result.is_ok(), Instruction::decode(word).is_some());
        prop_assert!(machine.call_stack().len() <= 16);
        prop_assert!(machine.framebuffer().iter().all(|&p| p <= 1));
    }

    #[test]
    fn wait_for_key_takes_lowest_pressed(keys in 1u16..=u16::MAX, x in 0u8..16) {
        let mut machine = machine_with_word(0xF00A | (x as u16) << 8, [0; 16], keys);
        machine.cycle().unwrap();

        prop_assert_eq!(machine.pc(), 0x202);
        prop_assert_eq!(machine.register(u4::new(x)), keys.trailing_zeros() as u8);
    }

    #[test]
    fn drawing_twice_restores_the_framebuffer(
        x in any::<u8>(),
        y in any::<u8>(),
        n in 1u8..16,
        sprite in any::<[u8; 15]>(),
    ) {
        let mut machine = Machine::new();
        let mut program = vec![0x60, x, 0x61, y, 0xA3, 0x00, 0xD0, 0x10 | n, 0xD0, 0x10 | n];
        program.resize(0x100, 0);
        program.extend_from_slice(&sprite);
        machine.load_program(&program).unwrap();

        for _ in 0..4 {
            machine.cycle().unwrap();
        }
        let lit = machine.framebuffer().iter().filter(|&&p| p != 0).count();
        let bits: u32 = sprite[..n as usize].iter().map(|b| b.count_ones()).sum();
        prop_assert_eq!(lit as u32, bits);

        machine.cycle().unwrap();
        prop_assert!(machine.framebuffer().iter().all(|&p| p == 0));
        prop_assert_eq!(machine.register(u4::MAX), (bits > 0) as u8);
    }
}
