//! Deception engine.
//!
//! A per-session virtual filesystem plus a shell-like interpreter whose
//! built-ins only ever read and mutate that filesystem. Nothing in this module
//! touches the host.
//!
//! Components:
//! - `filesystem`: the in-memory image each session owns.
//! - `parser`: redirect and pipeline splitting, quoting-aware tokenizer.
//! - `interpreter`: dispatch, piping, redirection and error containment.
//! - `commands`: the built-in simulators.
//! - `facts`: randomized but plausible system values.

pub mod commands;
pub mod facts;
pub mod filesystem;
pub mod interpreter;
pub mod parser;

pub use facts::{FactGenerator, SampledFacts};
pub use filesystem::{FsError, VirtualFs};
pub use interpreter::{CommandInterpreter, CommandOutput};
