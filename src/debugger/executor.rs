use std::collections::HashSet;

use super::commands::{BreakpointAction, Command, CommandError, CommandResult, SetTarget};
use crate::machine::{
    Framebuffer, Instruction, MEMORY_SIZE, Runner, RunnerConfig, RunnerStatus,
    UnrecognizedInstruction,
};
use crate::u12;

pub struct Executor {
    is_running: bool,
    runner: Runner,
    breakpoints: HashSet<u12>,
    /// Kept so `reset` can reinstall the image
    program: Vec<u8>,
}

impl Executor {
    pub fn new(runner: Runner, program: Vec<u8>) -> Self {
        Self {
            is_running: false,
            runner,
            breakpoints: HashSet::new(),
            program,
        }
    }

    /// Advances execution while in running mode.
    pub fn poll(&mut self, dt: f32) -> Result<RunnerStatus, UnrecognizedInstruction> {
        if !self.is_running {
            return Ok(RunnerStatus::Ok);
        }

        let result = self
            .runner
            .update_with_breakpoints(dt, Some(&self.breakpoints));

        if matches!(result, Err(_) | Ok(RunnerStatus::HitBreakpoint)) {
            self.is_running = false;
        }

        result
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Run => {
                self.run();
                Ok(CommandResult::Ok)
            }
            Command::Pause => {
                self.pause();
                Ok(CommandResult::Ok)
            }
            Command::Step { count } => self.step(count),
            Command::Breakpoint { action } => Ok(self.handle_breakpoint(action)),
            Command::Set { target, value } => self.handle_set(target, value),
            Command::Mem { start, len } => Ok(self.mem_dump(start, len)),
            Command::Disasm { start, count } => Ok(self.disasm(start, count)),
            Command::Reset => self.reset(),
            Command::Quit => Ok(CommandResult::Quit),
        }
    }

    pub fn run(&mut self) {
        self.is_running = true;
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    /// Runs `count` cycles, stopping early on an error or a breakpoint.
    pub fn step(&mut self, count: u32) -> Result<CommandResult, CommandError> {
        for _ in 0..count {
            self.runner.step()?;

            if self
                .breakpoints
                .contains(&u12::wrapping(self.runner.machine_ref().pc()))
            {
                break;
            }
        }
        Ok(CommandResult::Ok)
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn framebuffer(&self) -> Framebuffer {
        self.runner.machine_ref().framebuffer()
    }

    pub fn pc(&self) -> u16 {
        self.runner.machine_ref().pc()
    }

    pub fn index(&self) -> u16 {
        self.runner.machine_ref().index()
    }

    pub fn registers(&self) -> &[u8; 16] {
        self.runner.machine_ref().registers()
    }

    pub fn call_stack(&self) -> Vec<u16> {
        self.runner.machine_ref().call_stack()
    }

    pub fn delay_timer(&self) -> u8 {
        self.runner.machine_ref().delay_timer()
    }

    pub fn sound_timer(&self) -> u8 {
        self.runner.machine_ref().sound_timer()
    }

    pub fn keypad(&self) -> &[bool; 16] {
        self.runner.machine_ref().keypad()
    }

    pub fn config(&self) -> &RunnerConfig {
        self.runner.config()
    }

    pub fn is_breakpoint(&self, addr: u16) -> bool {
        self.breakpoints.contains(&u12::wrapping(addr))
    }

    /// Decodes `count` consecutive words starting at `start`.
    pub fn listing(&self, start: u16, count: u16) -> Vec<(u16, u16, Option<Instruction>)> {
        let machine = self.runner.machine_ref();

        (0..count)
            .map(|n| {
                let addr = start.wrapping_add(n.wrapping_mul(2));
                let word = machine.word_at(addr);
                (addr, word, Instruction::decode(word))
            })
            .collect()
    }

    pub fn runner_mut(&mut self) -> &mut Runner {
        &mut self.runner
    }

    fn handle_breakpoint(&mut self, action: BreakpointAction) -> CommandResult {
        match action {
            BreakpointAction::Set { addr } => {
                self.breakpoints.insert(u12::wrapping(addr));
            }
            BreakpointAction::Clear { addr } => {
                self.breakpoints.remove(&u12::wrapping(addr));
            }
            BreakpointAction::ClearAll => {
                self.breakpoints.clear();
            }
            BreakpointAction::List => {
                let mut breakpoints: Vec<u12> = self.breakpoints.iter().copied().collect();
                breakpoints.sort();
                return CommandResult::BreakpointList { breakpoints };
            }
        };

        CommandResult::Ok
    }

    fn handle_set(&mut self, target: SetTarget, value: u16) -> Result<CommandResult, CommandError> {
        let byte = |target: &'static str| {
            u8::try_from(value).map_err(|_| CommandError::ValueOutOfRange { value, target })
        };
        let machine = self.runner.machine_mut();

        match target {
            SetTarget::V(reg) => machine.set_register(reg, byte("a register")?),
            SetTarget::I => machine.set_index(value),
            SetTarget::Pc => machine.set_pc(value),
            SetTarget::Dt => machine.set_delay_timer(byte("the delay timer")?),
            SetTarget::St => machine.set_sound_timer(byte("the sound timer")?),
        }

        Ok(CommandResult::Ok)
    }

    fn mem_dump(&self, start: u16, len: u16) -> CommandResult {
        let memory = self.runner.machine_ref().memory();
        let data = (0..len as usize)
            .map(|offset| memory[(start as usize + offset) % MEMORY_SIZE])
            .collect();

        CommandResult::MemDump {
            data,
            offset: start,
        }
    }

    fn disasm(&self, start: Option<u16>, count: u16) -> CommandResult {
        let start = start.unwrap_or(self.pc());

        CommandResult::Disasm {
            instructions: self.listing(start, count),
        }
    }

    fn reset(&mut self) -> Result<CommandResult, CommandError> {
        self.is_running = false;

        let machine = self.runner.machine_mut();
        machine.reset();
        machine.load_program(&self.program)?;

        Ok(CommandResult::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{Machine, RunnerConfig};
    use crate::u4;

    // 0x200: V0 += 1; 0x202: V1 = 0x42; 0x204: JP 0x200
    const PROGRAM: [u8; 6] = [0x70, 0x01, 0x61, 0x42, 0x12, 0x00];

    fn executor() -> Executor {
        let mut machine = Machine::new();
        machine.load_program(&PROGRAM).unwrap();
        Executor::new(Runner::new(machine, RunnerConfig::default()), PROGRAM.to_vec())
    }

    #[test]
    fn step_executes_cycles() {
        let mut executor = executor();
        executor.execute(Command::Step { count: 2 }).unwrap();

        assert_eq!(executor.pc(), 0x204);
        assert_eq!(executor.registers()[0], 1);
        assert_eq!(executor.registers()[1], 0x42);
    }

    #[test]
    fn step_stops_on_breakpoint() {
        let mut executor = executor();
        executor
            .execute(Command::Breakpoint {
                action: BreakpointAction::Set { addr: 0x204 },
            })
            .unwrap();
        executor.execute(Command::Step { count: 10 }).unwrap();

        assert_eq!(executor.pc(), 0x204);
    }

    #[test]
    fn poll_only_runs_while_running() {
        let mut executor = executor();
        executor.poll(1.0).unwrap();
        assert_eq!(executor.pc(), 0x200);

        executor
            .execute(Command::Breakpoint {
                action: BreakpointAction::Set { addr: 0x202 },
            })
            .unwrap();
        executor.execute(Command::Run).unwrap();
        assert!(executor.is_running());

        let status = executor.poll(1.0).unwrap();
        assert_eq!(status, RunnerStatus::HitBreakpoint);
        assert!(!executor.is_running());
        assert_eq!(executor.pc(), 0x202);
    }

    #[test]
    fn breakpoint_list_is_sorted() {
        let mut executor = executor();
        for addr in [0x300, 0x200, 0x1250] {
            executor
                .execute(Command::Breakpoint {
                    action: BreakpointAction::Set { addr },
                })
                .unwrap();
        }

        let CommandResult::BreakpointList { breakpoints } = executor
            .execute(Command::Breakpoint {
                action: BreakpointAction::List,
            })
            .unwrap()
        else {
            panic!("expected a breakpoint list");
        };

        assert_eq!(
            breakpoints,
            vec![u12::new(0x200), u12::new(0x250), u12::new(0x300)]
        );
    }

    #[test]
    fn set_rejects_wide_values_for_byte_targets() {
        let mut executor = executor();

        executor
            .execute(Command::Set {
                target: SetTarget::V(u4::new(5)),
                value: 0xFF,
            })
            .unwrap();
        assert_eq!(executor.registers()[5], 0xFF);

        let err = executor
            .execute(Command::Set {
                target: SetTarget::Dt,
                value: 0x100,
            })
            .unwrap_err();
        assert!(matches!(err, CommandError::ValueOutOfRange { value: 0x100, .. }));

        executor
            .execute(Command::Set {
                target: SetTarget::I,
                value: 0x1234,
            })
            .unwrap();
        assert_eq!(executor.index(), 0x1234);
    }

    #[test]
    fn mem_dump_wraps() {
        let executor = executor();
        let CommandResult::MemDump { data, offset } = executor.mem_dump(0xFFE, 4) else {
            panic!("expected a memory dump");
        };
        assert_eq!(offset, 0xFFE);
        assert_eq!(data, vec![0, 0, 0, 0]);

        let CommandResult::MemDump { data, .. } = executor.mem_dump(0x200, 2) else {
            panic!("expected a memory dump");
        };
        assert_eq!(data, vec![0x70, 0x01]);
    }

    #[test]
    fn disasm_starts_at_pc_by_default() {
        let executor = executor();
        let CommandResult::Disasm { instructions } = executor.disasm(None, 4) else {
            panic!("expected a disassembly");
        };

        assert_eq!(instructions.len(), 4);
        assert_eq!(instructions[0].0, 0x200);
        assert_eq!(instructions[0].1, 0x7001);
        assert_eq!(
            instructions[2].2.map(|ins| ins.to_string()).as_deref(),
            Some("JP 0x200")
        );
        // 0x0000 past the program is not an instruction
        assert_eq!(instructions[3].2, None);
    }

    #[test]
    fn listing_wraps_and_breakpoints_mask_addresses() {
        let mut executor = executor();
        executor
            .execute(Command::Breakpoint {
                action: BreakpointAction::Set { addr: 0x1204 },
            })
            .unwrap();

        assert!(executor.is_breakpoint(0x204));
        assert!(!executor.is_breakpoint(0x202));

        let listing = executor.listing(0xFFE, 2);
        assert_eq!(listing[0].0, 0xFFE);
        assert_eq!(listing[1].0, 0x1000);
        assert_eq!(executor.config().cycles_per_frame, 10);
    }

    #[test]
    fn unrecognized_instruction_surfaces_from_step() {
        let mut executor = executor();
        executor
            .execute(Command::Set {
                target: SetTarget::Pc,
                value: 0x300,
            })
            .unwrap();

        let err = executor.execute(Command::Step { count: 1 }).unwrap_err();
        assert!(matches!(err, CommandError::Execution(_)));
    }

    #[test]
    fn reset_reloads_program() {
        let mut executor = executor();
        executor.execute(Command::Step { count: 3 }).unwrap();
        executor.execute(Command::Run).unwrap();

        executor.execute(Command::Reset).unwrap();

        assert!(!executor.is_running());
        assert_eq!(executor.pc(), 0x200);
        assert_eq!(executor.registers(), &[0; 16]);
        executor.execute(Command::Step { count: 1 }).unwrap();
        assert_eq!(executor.registers()[0], 1);
    }
}
