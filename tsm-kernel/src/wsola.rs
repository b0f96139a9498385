//! WSOLA (Waveform Similarity Overlap-Add) frame aligner.
//!
//! Plain overlap-add places every analysis frame exactly one analysis hop
//! after the previous one. On periodic material that breaks the waveform at
//! each frame boundary and the output buzzes. WSOLA lets each analysis frame
//! slide forward by up to `tolerance` samples and picks the position whose
//! waveform best continues what was emitted last time.
//!
//! The aligner keeps one prediction per channel, the *natural progression*:
//! the frame that would follow the last synthesis frame if the input were
//! played back at its original speed. Each new frame is correlated against
//! that prediction and the best-matching offset becomes the output.
//!
//! Extended frame layout, per channel:
//!
//! ```text
//! |<------------- L + T + Hs ------------->|
//! |<------ L ------>|<-- T -->|<--- Hs --->|
//! |<------ search window ---->|
//! ```

use crate::converter::Converter;
use crate::frame::{Frame, FrameError};
use tracing::{debug, trace};

/// Stateful WSOLA converter, one alignment state per channel
#[derive(Debug, Clone)]
pub struct WsolaConverter {
    channels: usize,
    frame_length: usize,
    synthesis_hop: usize,
    tolerance: usize,
    /// Last emitted frame, handed out by reference
    synthesis_frame: Frame,
    /// Expected continuation of the last emitted frame
    natural_progression: Frame,
    /// Shift chosen for each channel by the last call
    shifts: Vec<usize>,
    first: bool,
}

impl WsolaConverter {
    /// Create an aligner for `channels` channels of `frame_length`-sample
    /// frames, emitted every `synthesis_hop` samples, searching up to
    /// `tolerance` samples ahead.
    pub fn new(
        channels: usize,
        frame_length: usize,
        synthesis_hop: usize,
        tolerance: usize,
    ) -> Self {
        Self {
            channels,
            frame_length,
            synthesis_hop,
            tolerance,
            synthesis_frame: Frame::new(channels, frame_length),
            natural_progression: Frame::new(channels, frame_length),
            shifts: vec![0; channels],
            first: true,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    #[inline]
    pub fn synthesis_hop(&self) -> usize {
        self.synthesis_hop
    }

    #[inline]
    pub fn tolerance(&self) -> usize {
        self.tolerance
    }

    /// Samples per channel that `convert_frame` expects: `L + T + Hs`
    #[inline]
    pub fn extended_frame_length(&self) -> usize {
        self.frame_length + self.tolerance + self.synthesis_hop
    }

    /// Shift applied to each channel by the most recent `convert_frame`
    #[inline]
    pub fn shifts(&self) -> &[usize] {
        &self.shifts
    }

    /// Whether the next frame will be taken without alignment
    #[inline]
    pub fn is_first(&self) -> bool {
        self.first
    }
}

impl Converter for WsolaConverter {
    fn convert_frame(&mut self, analysis_frame: &Frame) -> Result<&Frame, FrameError> {
        analysis_frame.check_shape(self.channels, self.extended_frame_length())?;

        let length = self.frame_length;
        let search_end = length + self.tolerance;

        for k in 0..self.channels {
            let input = analysis_frame.channel(k);

            // The trailing Hs samples only feed the next prediction
            let delta = if self.first {
                0
            } else {
                best_shift(&input[..search_end], self.natural_progression.channel(k))
            };

            self.synthesis_frame
                .channel_mut(k)
                .copy_from_slice(&input[delta..delta + length]);

            let next = delta + self.synthesis_hop;
            self.natural_progression
                .channel_mut(k)
                .copy_from_slice(&input[next..next + length]);

            self.shifts[k] = delta;
        }

        trace!(shifts = ?self.shifts, first = self.first, "wsola frame aligned");
        self.first = false;

        Ok(&self.synthesis_frame)
    }

    fn clear(&mut self) {
        debug!("wsola state cleared");
        self.first = true;
    }
}

/// Offset of `reference` within `signal` with the highest cross-correlation.
///
/// Only full overlaps are scored, giving `signal.len() - reference.len() + 1`
/// candidates. The first maximum wins so equal scores favour the smallest
/// shift.
pub fn best_shift(signal: &[f32], reference: &[f32]) -> usize {
    debug_assert!(signal.len() >= reference.len());

    let candidates = signal.len() - reference.len() + 1;
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;

    for shift in 0..candidates {
        let score: f32 = signal[shift..shift + reference.len()]
            .iter()
            .zip(reference)
            .map(|(a, b)| a * b)
            .sum();

        if score > best_score {
            best_score = score;
            best = shift;
        }
    }

    best
}
