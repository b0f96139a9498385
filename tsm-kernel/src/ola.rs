//! Plain overlap-add converter.
//!
//! Frames are passed through untouched; the time scaling comes entirely from
//! the driver reading at one hop and writing at another. Useful as a baseline
//! and for non-periodic material where WSOLA's search buys nothing.

use crate::converter::Converter;
use crate::frame::{Frame, FrameError};

/// Non-shifting converter
#[derive(Debug, Clone)]
pub struct OlaConverter {
    channels: usize,
    frame_length: usize,
    synthesis_frame: Frame,
}

impl OlaConverter {
    pub fn new(channels: usize, frame_length: usize) -> Self {
        Self {
            channels,
            frame_length,
            synthesis_frame: Frame::new(channels, frame_length),
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
}

impl Converter for OlaConverter {
    fn convert_frame(&mut self, analysis_frame: &Frame) -> Result<&Frame, FrameError> {
        analysis_frame.check_shape(self.channels, self.frame_length)?;

        for k in 0..self.channels {
            self.synthesis_frame
                .channel_mut(k)
                .copy_from_slice(analysis_frame.channel(k));
        }

        Ok(&self.synthesis_frame)
    }

    fn clear(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mut ola = OlaConverter::new(2, 3);
        let frame = Frame::from_channels(vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]]).unwrap();

        let out = ola.convert_frame(&frame).unwrap();
        assert_eq!(out, &frame);
    }

    #[test]
    fn test_rejects_padded_frames() {
        let mut ola = OlaConverter::new(1, 4);

        assert_eq!(
            ola.convert_frame(&Frame::new(1, 6)).unwrap_err(),
            FrameError::FrameLength {
                expected: 4,
                actual: 6
            }
        );
    }
}
