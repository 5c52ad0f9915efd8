//! Error types for motif

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotifError {
    #[error("Slot out of range: {0}")]
    SlotOutOfRange(u8),
    #[error("Empty slot range: {min}..={max}")]
    EmptyRange { min: u8, max: u8 },
}

pub type Result<T> = std::result::Result<T, MotifError>;
