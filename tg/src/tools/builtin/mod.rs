//! Built-in tools

mod scripted;

pub use scripted::{Outcome, ScriptedTool};
