//! Time-scale modification kernel
//!
//! Changes the duration of an audio stream without changing its pitch:
//! - Frame: planar multichannel sample blocks
//! - Converter: the per-frame interface an overlap-add driver calls
//! - WSOLA: waveform-similarity frame aligner
//! - OLA: non-shifting baseline
//! - Params: derivation of hop sizes, tolerance and windows from a speed ratio

mod converter;
mod frame;
mod ola;
mod params;
mod wsola;

pub use converter::Converter;
pub use frame::{Frame, FrameError};
pub use ola::OlaConverter;
pub use params::{
    ola, wsola, ParamsError, TsmConfig, TsmParams, WindowKind, DEFAULT_FRAME_LENGTH,
};
pub use wsola::{best_shift, WsolaConverter};
