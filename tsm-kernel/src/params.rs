//! Parameter derivation for the TSM converters.
//!
//! Turns a handful of user-facing knobs into the fully resolved configuration
//! shared by a converter and the overlap-add driver. Knobs can also be kept
//! in a small `key=value` preset file.

use crate::ola::OlaConverter;
use crate::wsola::WsolaConverter;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Frame length used when none is given
pub const DEFAULT_FRAME_LENGTH: usize = 1024;

/// Errors raised while resolving or loading parameters
#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("Channel count must be at least 1")]
    ZeroChannels,
    #[error("Frame length must be at least 1")]
    ZeroFrameLength,
    #[error("Synthesis hop {hop} outside 1..={frame_length}")]
    InvalidSynthesisHop { hop: usize, frame_length: usize },
    #[error("Speed must be finite and positive, got {0}")]
    InvalidSpeed(f64),
    #[error("Analysis hop resolved to zero")]
    ZeroAnalysisHop,
    #[error("Tolerance {tolerance} must be below the frame length {frame_length}")]
    ToleranceTooLarge { tolerance: usize, frame_length: usize },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Window shapes the driver knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Hanning,
}

/// Fully resolved configuration shared by a converter and its driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsmConfig {
    pub channels: usize,
    /// Samples per synthesis frame (`L`)
    pub frame_length: usize,
    /// Input samples between consecutive analysis frames (`Ha`)
    pub analysis_hop: usize,
    /// Output samples between consecutive synthesis frames (`Hs`)
    pub synthesis_hop: usize,
    /// Maximum alignment shift (`T`)
    pub tolerance: usize,
    /// Window applied to analysis frames, `None` for rectangular
    pub analysis_window: Option<WindowKind>,
    /// Window applied to synthesis frames before overlap-add
    pub synthesis_window: Option<WindowKind>,
    /// Extra samples the driver supplies before the nominal frame
    pub delta_before: usize,
    /// Extra samples the driver supplies after the nominal frame
    pub delta_after: usize,
}

impl TsmConfig {
    /// Extra samples around the nominal frame
    #[inline]
    pub fn padding(&self) -> usize {
        self.delta_before + self.delta_after
    }

    /// Samples per channel in every analysis frame handed to the converter
    #[inline]
    pub fn extended_frame_length(&self) -> usize {
        self.frame_length + self.padding()
    }

    /// Effective speed ratio, `Ha / Hs`
    #[inline]
    pub fn speed(&self) -> f64 {
        self.analysis_hop as f64 / self.synthesis_hop as f64
    }
}

/// User-facing tuning knobs
///
/// Optional fields fall back to defaults derived from the frame length.
#[derive(Debug, Clone, PartialEq)]
pub struct TsmParams {
    pub channels: usize,
    /// Output speed relative to the input (0.5 = half as fast, twice as long).
    /// Ignored when `analysis_hop` is set.
    pub speed: f64,
    pub frame_length: usize,
    pub analysis_hop: Option<usize>,
    pub synthesis_hop: Option<usize>,
    pub tolerance: Option<usize>,
}

impl Default for TsmParams {
    fn default() -> Self {
        Self {
            channels: 2,
            speed: 1.0,
            frame_length: DEFAULT_FRAME_LENGTH,
            analysis_hop: None,
            synthesis_hop: None,
            tolerance: None,
        }
    }
}

impl TsmParams {
    /// Default parameters for `channels` channels
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            ..Self::default()
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_frame_length(mut self, frame_length: usize) -> Self {
        self.frame_length = frame_length;
        self
    }

    pub fn with_analysis_hop(mut self, hop: usize) -> Self {
        self.analysis_hop = Some(hop);
        self
    }

    pub fn with_synthesis_hop(mut self, hop: usize) -> Self {
        self.synthesis_hop = Some(hop);
        self
    }

    pub fn with_tolerance(mut self, tolerance: usize) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Resolve the hop sizes, returning `(Ha, Hs)`
    fn resolve_hops(&self) -> Result<(usize, usize), ParamsError> {
        if self.channels == 0 {
            return Err(ParamsError::ZeroChannels);
        }
        if self.frame_length == 0 {
            return Err(ParamsError::ZeroFrameLength);
        }

        let synthesis_hop = self.synthesis_hop.unwrap_or(self.frame_length / 2);
        if synthesis_hop == 0 || synthesis_hop > self.frame_length {
            return Err(ParamsError::InvalidSynthesisHop {
                hop: synthesis_hop,
                frame_length: self.frame_length,
            });
        }

        let analysis_hop = match self.analysis_hop {
            Some(hop) => hop,
            None => {
                if !self.speed.is_finite() || self.speed <= 0.0 {
                    return Err(ParamsError::InvalidSpeed(self.speed));
                }
                (synthesis_hop as f64 * self.speed).floor() as usize
            }
        };
        if analysis_hop == 0 {
            return Err(ParamsError::ZeroAnalysisHop);
        }

        Ok((analysis_hop, synthesis_hop))
    }

    /// Resolve the configuration for the WSOLA converter
    ///
    /// - `Hs` defaults to `L / 2`
    /// - `Ha` defaults to `floor(Hs × speed)`
    /// - `T` defaults to `L / 2`
    /// - no analysis window, Hanning synthesis window
    /// - the driver pads every frame with `T + Hs` trailing samples
    pub fn resolve_wsola(&self) -> Result<TsmConfig, ParamsError> {
        let (analysis_hop, synthesis_hop) = self.resolve_hops()?;

        let tolerance = self.tolerance.unwrap_or(self.frame_length / 2);
        if tolerance >= self.frame_length {
            return Err(ParamsError::ToleranceTooLarge {
                tolerance,
                frame_length: self.frame_length,
            });
        }

        let config = TsmConfig {
            channels: self.channels,
            frame_length: self.frame_length,
            analysis_hop,
            synthesis_hop,
            tolerance,
            analysis_window: None,
            synthesis_window: Some(WindowKind::Hanning),
            delta_before: 0,
            delta_after: tolerance + synthesis_hop,
        };

        debug!(
            channels = config.channels,
            frame_length = config.frame_length,
            analysis_hop = config.analysis_hop,
            synthesis_hop = config.synthesis_hop,
            tolerance = config.tolerance,
            "resolved wsola configuration"
        );

        Ok(config)
    }

    /// Resolve the configuration for plain overlap-add
    ///
    /// Hops resolve as for WSOLA; the tolerance is ignored and both windows
    /// are Hanning.
    pub fn resolve_ola(&self) -> Result<TsmConfig, ParamsError> {
        let (analysis_hop, synthesis_hop) = self.resolve_hops()?;

        let config = TsmConfig {
            channels: self.channels,
            frame_length: self.frame_length,
            analysis_hop,
            synthesis_hop,
            tolerance: 0,
            analysis_window: Some(WindowKind::Hanning),
            synthesis_window: Some(WindowKind::Hanning),
            delta_before: 0,
            delta_after: 0,
        };

        debug!(
            channels = config.channels,
            frame_length = config.frame_length,
            analysis_hop = config.analysis_hop,
            synthesis_hop = config.synthesis_hop,
            "resolved ola configuration"
        );

        Ok(config)
    }

    /// Parse a `key=value` preset
    ///
    /// Blank lines and `#` comments are skipped, unknown keys are ignored.
    pub fn parse(content: &str) -> Result<Self, ParamsError> {
        let mut params = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line, "ignoring preset line without '='");
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "channels" => params.channels = parse_value(key, value)?,
                "speed" => params.speed = parse_value(key, value)?,
                "frame_length" => params.frame_length = parse_value(key, value)?,
                "analysis_hop" => params.analysis_hop = parse_optional(key, value)?,
                "synthesis_hop" => params.synthesis_hop = parse_optional(key, value)?,
                "tolerance" => params.tolerance = parse_optional(key, value)?,
                _ => warn!(key, "ignoring unknown preset key"),
            }
        }

        Ok(params)
    }

    /// Load a preset from the default location
    ///
    /// Returns default parameters if the file is missing or invalid.
    pub fn load() -> Self {
        Self::load_from(&Self::preset_path()).unwrap_or_default()
    }

    /// Load a preset from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ParamsError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save a preset to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ParamsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_string())?;
        Ok(())
    }

    /// Default preset file path
    pub fn preset_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tsm")
            .join("params.txt")
    }
}

impl fmt::Display for TsmParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# TSM parameters")?;
        writeln!(f, "channels={}", self.channels)?;
        writeln!(f, "speed={}", self.speed)?;
        writeln!(f, "frame_length={}", self.frame_length)?;
        if let Some(hop) = self.analysis_hop {
            writeln!(f, "analysis_hop={}", hop)?;
        }
        if let Some(hop) = self.synthesis_hop {
            writeln!(f, "synthesis_hop={}", hop)?;
        }
        if let Some(tolerance) = self.tolerance {
            writeln!(f, "tolerance={}", tolerance)?;
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ParamsError> {
    value.parse().map_err(|_| ParamsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// An empty value clears the field
fn parse_optional(key: &str, value: &str) -> Result<Option<usize>, ParamsError> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_value(key, value).map(Some)
    }
}

/// Build a WSOLA converter together with the configuration for its driver
pub fn wsola(params: &TsmParams) -> Result<(WsolaConverter, TsmConfig), ParamsError> {
    let config = params.resolve_wsola()?;
    let converter = WsolaConverter::new(
        config.channels,
        config.frame_length,
        config.synthesis_hop,
        config.tolerance,
    );
    Ok((converter, config))
}

/// Build a plain overlap-add converter together with its configuration
pub fn ola(params: &TsmParams) -> Result<(OlaConverter, TsmConfig), ParamsError> {
    let config = params.resolve_ola()?;
    let converter = OlaConverter::new(config.channels, config.frame_length);
    Ok((converter, config))
}
