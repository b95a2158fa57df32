use std::collections::HashSet;

use super::{Machine, UnrecognizedInstruction};
use crate::{u4, u12};

pub const FRAME_HZ: f32 = 60.0;
const FRAME_TIME_STEP: f32 = 1.0 / FRAME_HZ;

/// Frames we are willing to catch up on in a single update. Anything older is
/// dropped so a stalled host does not run a burst of cycles afterwards.
const MAX_CATCH_UP_FRAMES: u32 = 4;

pub const DEFAULT_CYCLES_PER_FRAME: u32 = 10;

/// What the runner does when the machine hits an unrecognized instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UnknownInstructionPolicy {
    /// Stop and return the error to the host.
    #[default]
    Halt,
    /// Log a warning and keep executing.
    Skip,
}

/// Host pacing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub cycles_per_frame: u32,
    pub on_unknown: UnknownInstructionPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cycles_per_frame: DEFAULT_CYCLES_PER_FRAME,
            on_unknown: UnknownInstructionPolicy::Halt,
        }
    }
}

/// Drives a `Machine` from wall-clock time, a fixed number of cycles per 60Hz frame.
pub struct Runner {
    machine: Machine,
    config: RunnerConfig,
    frame_dt_accumulator: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Ok,
    HitBreakpoint,
}

impl Runner {
    pub fn new(machine: Machine, config: RunnerConfig) -> Self {
        Self {
            machine,
            config,
            frame_dt_accumulator: 0.0,
        }
    }

    /// Update the machine by delta time.
    ///
    /// Runs `cycles_per_frame` cycles for every whole frame that has elapsed.
    pub fn update(&mut self, dt: f32) -> Result<RunnerStatus, UnrecognizedInstruction> {
        self.update_with_breakpoints(dt, None)
    }

    /// Like `update` but stops as soon as the program counter lands on a breakpoint.
    pub fn update_with_breakpoints(
        &mut self,
        dt: f32,
        breakpoints: Option<&HashSet<u12>>,
    ) -> Result<RunnerStatus, UnrecognizedInstruction> {
        self.frame_dt_accumulator += dt;

        let frames = (self.frame_dt_accumulator / FRAME_TIME_STEP) as u32;
        self.frame_dt_accumulator -= frames as f32 * FRAME_TIME_STEP;

        for _ in 0..frames.min(MAX_CATCH_UP_FRAMES) {
            if self.run_frame(breakpoints)? == RunnerStatus::HitBreakpoint {
                self.frame_dt_accumulator = 0.0;
                return Ok(RunnerStatus::HitBreakpoint);
            }
        }

        Ok(RunnerStatus::Ok)
    }

    /// Runs one frame worth of cycles.
    pub fn run_frame(
        &mut self,
        breakpoints: Option<&HashSet<u12>>,
    ) -> Result<RunnerStatus, UnrecognizedInstruction> {
        for _ in 0..self.config.cycles_per_frame {
            self.step()?;

            if let Some(breakpoints) = breakpoints
                && breakpoints.contains(&u12::wrapping(self.machine.pc()))
            {
                return Ok(RunnerStatus::HitBreakpoint);
            }
        }

        Ok(RunnerStatus::Ok)
    }

    /// Executes one cycle, applying the unrecognized-instruction policy.
    pub fn step(&mut self) -> Result<(), UnrecognizedInstruction> {
        match self.machine.cycle() {
            Err(err) if self.config.on_unknown == UnknownInstructionPolicy::Skip => {
                tracing::warn!(opcode = err.opcode, address = err.address, "skipping {err}");
                Ok(())
            }
            result => result,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Returns true if the sound timer is active.
    pub fn sound_active(&self) -> bool {
        self.machine.sound_active()
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.machine.set_key(key, pressed)
    }

    /// Get the state of a pixel on the display (true = on).
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.machine.pixel(x, y)
    }

    pub fn machine_ref(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }
}
