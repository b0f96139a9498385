//! Overlap-add framework for TSM converters
//!
//! Provides the pieces that sit around a frame converter:
//! - Window: Hanning coefficients and window arithmetic
//! - AnalysisSynthesis: frame extraction, overlap-add and normalisation

pub mod window;
mod synthesis;

pub use synthesis::{AnalysisSynthesis, ProcessError};
pub use tsm_kernel::{Converter, Frame, FrameError, ParamsError, TsmConfig, TsmParams};
