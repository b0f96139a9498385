//! Analysis/synthesis driver.
//!
//! Reads analysis frames from the input every `Ha` samples, hands them to a
//! [`Converter`], windows the synthesis frames it returns and overlap-adds
//! them into the output every `Hs` samples. The output is then divided by
//! the accumulated window weight so overlap-add does not change the volume.
//!
//! The input is preceded by half a frame of silence and that much output is
//! dropped again, so the first output sample comes from the centre of the
//! first frame rather than from its fade-in.

use crate::window;
use thiserror::Error;
use tracing::debug;
use tsm_kernel::{
    Converter, Frame, FrameError, OlaConverter, ParamsError, TsmConfig, TsmParams, WsolaConverter,
};

/// Accumulated window weights below this are left undivided
const NORMALIZE_EPSILON: f32 = 1e-4;

/// Errors that can occur while processing a signal
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Invalid parameters: {0}")]
    Params(#[from] ParamsError),
    #[error("Converter rejected frame: {0}")]
    Frame(#[from] FrameError),
    #[error("Expected {expected} input channels, got {actual}")]
    ChannelCount { expected: usize, actual: usize },
    #[error("Input channels have different lengths")]
    RaggedInput,
}

/// Overlap-add time-scale modifier built around a converter
pub struct AnalysisSynthesis<C> {
    converter: C,
    config: TsmConfig,
    analysis_window: Option<Vec<f32>>,
    synthesis_window: Option<Vec<f32>>,
    /// Weight each output sample receives per frame
    normalize_window: Vec<f32>,
}

impl AnalysisSynthesis<WsolaConverter> {
    /// WSOLA time-scale modifier
    pub fn wsola(params: &TsmParams) -> Result<Self, ParamsError> {
        let (converter, config) = tsm_kernel::wsola(params)?;
        Ok(Self::new(converter, config))
    }
}

impl AnalysisSynthesis<OlaConverter> {
    /// Plain overlap-add time-scale modifier
    pub fn ola(params: &TsmParams) -> Result<Self, ParamsError> {
        let (converter, config) = tsm_kernel::ola(params)?;
        Ok(Self::new(converter, config))
    }
}

impl<C: Converter> AnalysisSynthesis<C> {
    /// Wrap a converter; `config` must describe the frames it expects
    pub fn new(converter: C, config: TsmConfig) -> Self {
        let length = config.frame_length;
        let analysis_window = window::build(config.analysis_window, length);
        let synthesis_window = window::build(config.synthesis_window, length);
        let normalize_window = window::product(
            analysis_window.as_deref(),
            synthesis_window.as_deref(),
        )
        .unwrap_or_else(|| vec![1.0; length]);

        Self {
            converter,
            config,
            analysis_window,
            synthesis_window,
            normalize_window,
        }
    }

    #[inline]
    pub fn config(&self) -> &TsmConfig {
        &self.config
    }

    #[inline]
    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Reset the converter for a new session
    pub fn clear(&mut self) {
        self.converter.clear();
    }

    /// Output samples produced for `input_len` input samples
    pub fn output_len(&self, input_len: usize) -> usize {
        let scale = self.config.synthesis_hop as f64 / self.config.analysis_hop as f64;
        (input_len as f64 * scale).round() as usize
    }

    /// Time-scale a complete signal, one vector per channel
    ///
    /// Every call is a fresh session: the converter is cleared first.
    pub fn process(&mut self, input: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, ProcessError> {
        let channels = self.config.channels;
        if input.len() != channels {
            return Err(ProcessError::ChannelCount {
                expected: channels,
                actual: input.len(),
            });
        }

        let input_len = input.first().map_or(0, Vec::len);
        if input.iter().any(|c| c.len() != input_len) {
            return Err(ProcessError::RaggedInput);
        }

        self.converter.clear();

        let output_len = self.output_len(input_len);
        if output_len == 0 {
            return Ok(vec![Vec::new(); channels]);
        }

        let length = self.config.frame_length;
        let analysis_hop = self.config.analysis_hop;
        let synthesis_hop = self.config.synthesis_hop;
        let extended = self.config.extended_frame_length();
        let lead = length / 2;

        // Enough frames to cover the dropped lead-in plus the whole output
        let frames = (lead + output_len).div_ceil(synthesis_hop);
        debug!(input_len, output_len, frames, "tsm session started");

        // Silence before the signal and after it, so every frame is full
        let offset = lead + self.config.delta_before;
        let padded_len = ((frames - 1) * analysis_hop + extended).max(offset + input_len);
        let padded: Vec<Vec<f32>> = input
            .iter()
            .map(|samples| {
                let mut buffer = vec![0.0; padded_len];
                buffer[offset..offset + input_len].copy_from_slice(samples);
                buffer
            })
            .collect();

        let accumulated_len = (frames - 1) * synthesis_hop + length;
        let mut output = vec![vec![0.0f32; accumulated_len]; channels];
        let mut weights = vec![0.0f32; accumulated_len];
        let mut analysis = Frame::new(channels, extended);
        let nominal = self.config.delta_before..self.config.delta_before + length;

        for k in 0..frames {
            let start = k * analysis_hop;
            for (c, source) in padded.iter().enumerate() {
                let frame = analysis.channel_mut(c);
                frame.copy_from_slice(&source[start..start + extended]);
                window::apply(&mut frame[nominal.clone()], self.analysis_window.as_deref());
            }

            let synthesis = self.converter.convert_frame(&analysis)?;

            let at = k * synthesis_hop;
            for (c, out) in output.iter_mut().enumerate() {
                let target = &mut out[at..at + length];
                match self.synthesis_window.as_deref() {
                    Some(coefficients) => {
                        for ((o, &s), &w) in target
                            .iter_mut()
                            .zip(synthesis.channel(c))
                            .zip(coefficients)
                        {
                            *o += s * w;
                        }
                    }
                    None => {
                        for (o, &s) in target.iter_mut().zip(synthesis.channel(c)) {
                            *o += s;
                        }
                    }
                }
            }

            for (acc, &w) in weights[at..at + length].iter_mut().zip(&self.normalize_window) {
                *acc += w;
            }
        }

        let result = output
            .into_iter()
            .map(|mut out| {
                for (sample, &weight) in out.iter_mut().zip(&weights) {
                    if weight >= NORMALIZE_EPSILON {
                        *sample /= weight;
                    }
                }
                out[lead..lead + output_len].to_vec()
            })
            .collect();

        debug!(frames, "tsm session finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::{num_complex::Complex, FftPlanner};
    use std::f32::consts::PI;

    fn sine(len: usize, period: f32, phase: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * i as f32 / period + phase).sin())
            .collect()
    }

    /// Index of the strongest positive-frequency FFT bin
    fn dominant_bin(samples: &[f32]) -> usize {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(samples.len());
        let mut buffer: Vec<Complex<f32>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        fft.process(&mut buffer);

        let mut best = 1;
        for k in 1..samples.len() / 2 {
            if buffer[k].norm() > buffer[best].norm() {
                best = k;
            }
        }
        best
    }

    fn small_params() -> TsmParams {
        TsmParams::new(1)
            .with_frame_length(8)
            .with_synthesis_hop(4)
            .with_tolerance(2)
            .with_speed(0.5)
    }

    #[test]
    fn test_small_wsola_shifts_stay_in_tolerance() {
        let (mut converter, config) = tsm_kernel::wsola(&small_params()).unwrap();
        assert_eq!(config.extended_frame_length(), 14);

        let signal = sine(200, 3.0, 0.4);
        for start in (0..=200 - 14).step_by(config.analysis_hop) {
            let frame = Frame::from_channels(vec![signal[start..start + 14].to_vec()]).unwrap();
            converter.convert_frame(&frame).unwrap();
            assert!(converter.shifts()[0] <= 2);
        }
    }

    #[test]
    fn test_small_wsola_preserves_period() {
        let mut tsm = AnalysisSynthesis::wsola(&small_params()).unwrap();
        let input = sine(200, 3.0, 0.4);

        let output = tsm.process(&[input]).unwrap();
        let out = &output[0];

        // Twice as long, same pitch
        assert_eq!(out.len(), 400);
        for i in 8..400 - 24 {
            assert!(
                (out[i + 3] - out[i]).abs() < 1e-4,
                "sample {}: {} vs {}",
                i,
                out[i],
                out[i + 3]
            );
            assert!((out[i + 1] - out[i]).abs() > 0.1);
            assert!(out[i].abs() < 1.0 + 1e-4);
        }
    }

    #[test]
    fn test_wsola_keeps_dominant_frequency() {
        let mut tsm = AnalysisSynthesis::wsola(&TsmParams::new(1).with_speed(0.75)).unwrap();
        let sample_rate = 44100.0;
        let input = sine(22050, sample_rate / 440.0, 0.0);

        let output = tsm.process(&[input.clone()]).unwrap();
        assert_eq!(output[0].len(), 29400);

        let window = 16384;
        let in_bin = dominant_bin(&input[2048..2048 + window]);
        let out_bin = dominant_bin(&output[0][4096..4096 + window]);
        assert!(in_bin.abs_diff(out_bin) <= 1, "input bin {} output bin {}", in_bin, out_bin);
    }

    #[test]
    fn test_ola_at_unit_speed_reconstructs_input() {
        let mut tsm = AnalysisSynthesis::ola(&TsmParams::new(2).with_frame_length(64)).unwrap();
        let left = sine(1000, 37.0, 0.0);
        let right = sine(1000, 11.0, 1.0);

        let output = tsm.process(&[left.clone(), right.clone()]).unwrap();

        for (out, expected) in output.iter().zip([&left, &right]) {
            assert_eq!(out.len(), expected.len());
            for (a, b) in out.iter().zip(expected.iter()) {
                assert!((a - b).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_output_length_follows_hops() {
        let tsm = AnalysisSynthesis::wsola(&TsmParams::new(1).with_speed(2.0)).unwrap();
        assert_eq!(tsm.config().analysis_hop, 1024);
        assert_eq!(tsm.output_len(10000), 5000);

        let tsm = AnalysisSynthesis::wsola(&TsmParams::new(1).with_speed(0.5)).unwrap();
        assert_eq!(tsm.output_len(10000), 20000);
    }

    #[test]
    fn test_process_is_repeatable() {
        let params = TsmParams::new(1).with_frame_length(128).with_speed(1.3);
        let mut tsm = AnalysisSynthesis::wsola(&params).unwrap();
        let input = vec![sine(3000, 29.0, 0.2)];

        let first = tsm.process(&input).unwrap();
        let second = tsm.process(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        let mut tsm = AnalysisSynthesis::wsola(&TsmParams::new(2)).unwrap();
        let output = tsm.process(&[Vec::new(), Vec::new()]).unwrap();
        assert_eq!(output, vec![Vec::<f32>::new(), Vec::new()]);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut tsm = AnalysisSynthesis::wsola(&TsmParams::new(2)).unwrap();

        assert!(matches!(
            tsm.process(&[vec![0.0; 10]]),
            Err(ProcessError::ChannelCount {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            tsm.process(&[vec![0.0; 10], vec![0.0; 9]]),
            Err(ProcessError::RaggedInput)
        ));
    }

    #[test]
    fn test_mismatched_converter_surfaces_frame_error() {
        let config = TsmParams::new(1).resolve_wsola().unwrap();
        let mut tsm = AnalysisSynthesis::new(WsolaConverter::new(1, 1024, 512, 100), config);

        assert!(matches!(
            tsm.process(&[vec![0.0; 4096]]),
            Err(ProcessError::Frame(FrameError::FrameLength { .. }))
        ));
    }
}
