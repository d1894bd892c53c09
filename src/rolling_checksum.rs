use thiserror::Error;

pub mod adler32;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingError {
    #[error("cannot slide an empty window: there is no byte to evict")]
    EmptyWindow,
}

/// A weak checksum over a fixed-length window that can move forward one byte at a time
/// without being recomputed from scratch.
pub trait RollingChecksum {
    type ChecksumType;

    fn new(initial_window: &[u8]) -> Self;
    fn checksum(&self) -> Self::ChecksumType;
    fn window_len(&self) -> usize;

    /// Evicts the oldest byte of the window, admits `new_byte` and returns the checksum of
    /// the resulting window.
    fn slide_by(&mut self, new_byte: u8) -> Result<Self::ChecksumType, RollingError>;
}
