//! Output
//!
//! - `solution`: the persisted, sorted result artifact
//! - `text`: console summary of a finished run

pub mod solution;
pub mod text;
