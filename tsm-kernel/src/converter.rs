//! The per-frame conversion interface shared by all TSM procedures

use crate::frame::{Frame, FrameError};

/// Turns analysis frames into synthesis frames, one call per hop.
///
/// Implementations own whatever state links consecutive frames. Frames must
/// be supplied strictly in stream order with no gaps.
pub trait Converter {
    /// Convert one analysis frame into a synthesis frame.
    ///
    /// The returned frame lives in a buffer owned by the converter and is
    /// overwritten by the next call; copy it out to keep it longer.
    fn convert_frame(&mut self, analysis_frame: &Frame) -> Result<&Frame, FrameError>;

    /// Forget all inter-frame state so the next frame starts a new session
    fn clear(&mut self);
}
