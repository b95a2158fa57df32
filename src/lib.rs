//! A CHIP-8 virtual machine: the fetch-decode-execute core plus a frame
//! runner and a command-driven debugger for host front-ends.

pub mod debugger;
pub mod machine;
mod nibble;

pub use nibble::{u4, u12};
