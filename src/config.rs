use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::preset::{MESH_MAX, MESH_MIN};

pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_FFT_SIZE: usize = 1024;
pub const DEFAULT_MAX_CATCH_UP: u32 = 4;
pub const FFT_SIZE_MIN: usize = 64;
pub const FFT_SIZE_MAX: usize = 16384;

#[derive(Parser, Debug, Clone)]
#[command(name = "warpviz", version, about = "Audio-reactive mesh-warp preset renderer for the terminal")]
pub struct Config {
    #[arg(long, value_enum, default_value_t = AudioSource::Mic)]
    pub source: AudioSource,

    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// Overrides the preset's mesh column hint.
    #[arg(long)]
    pub mesh_cols: Option<usize>,

    /// Overrides the preset's mesh row hint.
    #[arg(long)]
    pub mesh_rows: Option<usize>,

    /// Audio window length in samples (power of two).
    #[arg(long, default_value_t = DEFAULT_FFT_SIZE)]
    pub fft_size: usize,

    /// Comma-separated mix ratios, one blur pass per entry.
    #[arg(long, value_delimiter = ',')]
    pub blur: Vec<f32>,

    #[arg(long, default_value_t = false)]
    pub antialias: bool,

    /// Disables synchronized-update escapes for terminals that mishandle them.
    #[arg(long, default_value_t = false)]
    pub no_sync: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_CATCH_UP)]
    pub max_catch_up: u32,

    /// Seeds every random source for reproducible output.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = BackendPreference::Auto)]
    pub backend: BackendPreference,

    /// Blend duration in seconds for preset switches.
    #[arg(long, default_value_t = 2.0)]
    pub blend: f32,

    /// Built-in preset index or case-insensitive name fragment.
    #[arg(long)]
    pub preset: Option<String>,

    #[arg(long)]
    pub sample_rate_hint: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AudioSource {
    Mic,
    /// No capture device; renders against silence.
    #[value(alias = "none")]
    Silence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendPreference {
    #[default]
    Auto,
    #[value(alias = "opt")]
    Optimized,
    #[value(alias = "compiled")]
    Basic,
    #[value(alias = "interp")]
    Interpreted,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("fps must be in 1..=240, got {0}")]
    Fps(u32),
    #[error("mesh {axis} must be in {MESH_MIN}..={MESH_MAX}, got {value}")]
    Mesh { axis: &'static str, value: usize },
    #[error("fft size must be a power of two in {FFT_SIZE_MIN}..={FFT_SIZE_MAX}, got {0}")]
    FftSize(usize),
    #[error("blur pass #{index} mix {mix} outside [0, 1]")]
    BlurMix { index: usize, mix: f32 },
    #[error("max catch-up must be at least 1")]
    CatchUp,
    #[error("blend duration must be a representable number of seconds >= 0, got {0}")]
    Blend(f32),
}

/// Everything the renderer consumes. Constructed once and passed in.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub fps: u32,
    pub mesh_cols: Option<usize>,
    pub mesh_rows: Option<usize>,
    pub fft_size: usize,
    pub blur: Vec<f32>,
    pub antialias: bool,
    pub max_catch_up: u32,
    pub seed: Option<u64>,
    pub backend: BackendPreference,
    pub sample_rate: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            mesh_cols: None,
            mesh_rows: None,
            fft_size: DEFAULT_FFT_SIZE,
            blur: Vec::new(),
            antialias: false,
            max_catch_up: DEFAULT_MAX_CATCH_UP,
            seed: None,
            backend: BackendPreference::Auto,
            sample_rate: 44_100,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=240).contains(&self.fps) {
            return Err(ConfigError::Fps(self.fps));
        }
        let mesh = MESH_MIN..=MESH_MAX;
        for (axis, value) in [("cols", self.mesh_cols), ("rows", self.mesh_rows)] {
            if let Some(value) = value {
                if !mesh.contains(&value) {
                    return Err(ConfigError::Mesh { axis, value });
                }
            }
        }
        if !self.fft_size.is_power_of_two() || !(FFT_SIZE_MIN..=FFT_SIZE_MAX).contains(&self.fft_size) {
            return Err(ConfigError::FftSize(self.fft_size));
        }
        for (index, &mix) in self.blur.iter().enumerate() {
            if !(0.0..=1.0).contains(&mix) {
                return Err(ConfigError::BlurMix { index, mix });
            }
        }
        if self.max_catch_up == 0 {
            return Err(ConfigError::CatchUp);
        }
        Ok(())
    }
}

impl Config {
    /// The `--blend` seconds as a duration; rejects values `Duration` cannot hold.
    pub fn blend_duration(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f32(self.blend).map_err(|_| ConfigError::Blend(self.blend))
    }

    pub fn render_config(&self) -> Result<RenderConfig, ConfigError> {
        self.blend_duration()?;
        let cfg = RenderConfig {
            fps: self.fps,
            mesh_cols: self.mesh_cols,
            mesh_rows: self.mesh_rows,
            fft_size: self.fft_size,
            blur: self.blur.clone(),
            antialias: self.antialias,
            max_catch_up: self.max_catch_up,
            seed: self.seed,
            backend: self.backend,
            sample_rate: self.sample_rate_hint.unwrap_or(44_100),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_blur_list_and_backend() {
        let cfg = Config::parse_from([
            "warpviz",
            "--blur",
            "0.5,0.25",
            "--backend",
            "interp",
            "--fft-size",
            "512",
        ]);
        let rc = cfg.render_config().expect("valid");
        assert_eq!(rc.blur, vec![0.5, 0.25]);
        assert_eq!(rc.backend, BackendPreference::Interpreted);
        assert_eq!(rc.fft_size, 512);
    }

    #[test]
    fn rejects_bad_fft_size() {
        let rc = RenderConfig {
            fft_size: 1000,
            ..RenderConfig::default()
        };
        assert_eq!(rc.validate(), Err(ConfigError::FftSize(1000)));
    }

    #[test]
    fn blend_must_fit_a_duration() {
        let cfg = Config::parse_from(["warpviz", "--blend", "1e20"]);
        assert_eq!(cfg.blend_duration(), Err(ConfigError::Blend(1e20)));
        assert_eq!(cfg.render_config(), Err(ConfigError::Blend(1e20)));

        let cfg = Config::parse_from(["warpviz", "--blend", "1.5"]);
        assert_eq!(cfg.blend_duration(), Ok(Duration::from_millis(1500)));
    }
}
