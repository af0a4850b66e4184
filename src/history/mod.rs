//! Rename history for recovery.
//!
//! - `log`: append-only, human-readable record of every rename and
//!   duplicate removal
//! - `undo`: reverses one logged run with conflict detection

mod log;
mod undo;

pub use log::*;
pub use undo::*;
