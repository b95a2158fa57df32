mod cycle;
mod execute;
mod font;
mod instruction;
mod loader;
mod random;
mod runner;
mod state;
mod types;

pub use font::*;
pub use instruction::*;
pub use random::*;
pub use runner::*;
pub use state::*;
pub use types::*;
