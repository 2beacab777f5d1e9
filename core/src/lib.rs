pub mod config;
pub mod error;
pub mod midi;
pub mod sequence;
pub mod time;
pub mod transport;

pub use crate::error::{Result, SequencerError};
