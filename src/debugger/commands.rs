use clap::{Parser, Subcommand};
use clap_num::maybe_hex;

use crate::{
    machine::{Instruction, LoadError, UnrecognizedInstruction},
    u4, u12,
};

#[derive(Parser)]
#[command(multicall = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    #[command(visible_alias = "r")]
    Run,

    #[command(visible_alias = "p")]
    Pause,

    /// Execute one or more cycles
    #[command(visible_alias = "s")]
    Step {
        #[arg(default_value = "1", value_parser = maybe_hex::<u32>)]
        count: u32,
    },

    #[command(visible_alias = "b")]
    Breakpoint {
        #[command(subcommand)]
        action: BreakpointAction,
    },

    /// Assign a register, I, PC or a timer
    Set {
        #[arg(value_parser = parse_set_target)]
        target: SetTarget,
        #[arg(value_parser = maybe_hex::<u16>)]
        value: u16,
    },

    /// Dump memory
    #[command(visible_alias = "m")]
    Mem {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "64", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    /// Disassemble instructions
    #[command(visible_alias = "d")]
    Disasm {
        /// Defaults to the program counter
        #[arg(value_parser = maybe_hex::<u16>)]
        start: Option<u16>,
        #[arg(default_value = "16", value_parser = maybe_hex::<u16>)]
        count: u16,
    },

    /// Reinitialize the machine and reload the program
    Reset,

    #[command(visible_alias = "q")]
    Quit,
}

#[derive(Debug)]
pub enum CommandResult {
    Ok,
    BreakpointList {
        breakpoints: Vec<u12>,
    },
    MemDump {
        data: Vec<u8>,
        offset: u16,
    },
    /// (address, raw word, decoded instruction) triples
    Disasm {
        instructions: Vec<(u16, u16, Option<Instruction>)>,
    },
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Error while executing instruction: {0}")]
    Execution(#[from] UnrecognizedInstruction),
    #[error("Failed to reload program: {0}")]
    Load(#[from] LoadError),
    #[error("Value {value:#X} out of range for {target}")]
    ValueOutOfRange { value: u16, target: &'static str },
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum BreakpointAction {
    #[command(visible_alias = "s")]
    Set {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "c")]
    Clear {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "l")]
    List,

    #[command(visible_alias = "ca")]
    ClearAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetTarget {
    V(u4),
    I,
    Pc,
    Dt,
    St,
}

fn parse_set_target(s: &str) -> Result<SetTarget, String> {
    let lower = s.to_lowercase();

    match lower.as_str() {
        "index" | "i" => Ok(SetTarget::I),
        "pc" => Ok(SetTarget::Pc),
        "dt" | "delay" => Ok(SetTarget::Dt),
        "st" | "sound" => Ok(SetTarget::St),

        _ if lower.starts_with('v') => match u8::from_str_radix(&lower[1..], 16) {
            Ok(val) if val < 16 => Ok(SetTarget::V(u4::new(val))),
            _ => Err(format!("Invalid register: '{}'", s)),
        },

        _ => Err(format!("Unknown set target: '{}'", s)),
    }
}
