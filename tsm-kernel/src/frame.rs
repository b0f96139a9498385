//! Planar multichannel sample blocks

use thiserror::Error;

/// Errors raised when a frame does not have the shape a converter expects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Expected {expected} channels, got {actual}")]
    ChannelCount { expected: usize, actual: usize },
    #[error("Expected frames of {expected} samples, got {actual}")]
    FrameLength { expected: usize, actual: usize },
    #[error("Channels have different lengths")]
    RaggedChannels,
}

/// A block of samples for every channel, stored channel after channel
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    channels: usize,
    len: usize,
    samples: Vec<f32>,
}

impl Frame {
    /// Create a zero-filled frame
    pub fn new(channels: usize, len: usize) -> Self {
        Self {
            channels,
            len,
            samples: vec![0.0; channels * len],
        }
    }

    /// Build a frame from one vector per channel
    ///
    /// Every channel must have the same length.
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Result<Self, FrameError> {
        let len = channels.first().map_or(0, Vec::len);
        if channels.iter().any(|c| c.len() != len) {
            return Err(FrameError::RaggedChannels);
        }

        Ok(Self {
            channels: channels.len(),
            len,
            samples: channels.into_iter().flatten().collect(),
        })
    }

    /// Number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Samples of channel `k`
    ///
    /// Panics if `k` is out of range.
    #[inline]
    pub fn channel(&self, k: usize) -> &[f32] {
        &self.samples[k * self.len..(k + 1) * self.len]
    }

    /// Mutable samples of channel `k`
    #[inline]
    pub fn channel_mut(&mut self, k: usize) -> &mut [f32] {
        &mut self.samples[k * self.len..(k + 1) * self.len]
    }

    /// Iterate over the channels in order
    pub fn iter_channels(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on a zero chunk size
        self.samples.chunks_exact(self.len.max(1)).take(self.channels)
    }

    /// Set every sample to zero
    pub fn fill_zero(&mut self) {
        self.samples.fill(0.0);
    }

    /// Split back into one vector per channel
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        (0..self.channels).map(|k| self.channel(k).to_vec()).collect()
    }

    /// Reject the frame unless it is `channels × len`
    pub fn check_shape(&self, channels: usize, len: usize) -> Result<(), FrameError> {
        if self.channels != channels {
            return Err(FrameError::ChannelCount {
                expected: channels,
                actual: self.channels,
            });
        }
        if self.len != len {
            return Err(FrameError::FrameLength {
                expected: len,
                actual: self.len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channels_layout() {
        let frame = Frame::from_channels(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();

        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(frame.channel(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        let result = Frame::from_channels(vec![vec![1.0, 2.0], vec![3.0]]);
        assert_eq!(result, Err(FrameError::RaggedChannels));
    }

    #[test]
    fn test_channel_mut_only_touches_one_channel() {
        let mut frame = Frame::new(2, 4);
        frame.channel_mut(1).copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        assert!(frame.channel(0).iter().all(|&s| s == 0.0));
        assert!(frame.channel(1).iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_iter_channels_and_into_channels() {
        let channels = vec![vec![0.5, -0.5], vec![0.25, -0.25], vec![1.0, -1.0]];
        let frame = Frame::from_channels(channels.clone()).unwrap();

        let collected: Vec<Vec<f32>> = frame.iter_channels().map(<[f32]>::to_vec).collect();
        assert_eq!(collected, channels);
        assert_eq!(frame.into_channels(), channels);
    }

    #[test]
    fn test_check_shape() {
        let frame = Frame::new(2, 14);

        assert!(frame.check_shape(2, 14).is_ok());
        assert_eq!(
            frame.check_shape(1, 14),
            Err(FrameError::ChannelCount {
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(
            frame.check_shape(2, 12),
            Err(FrameError::FrameLength {
                expected: 12,
                actual: 14
            })
        );
    }
}
