use clap::Parser;
use std::path::PathBuf;

use crate::config::{DEFAULT_DIM, DEFAULT_FPS};

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Render: ", BACKEND, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

#[cfg(feature = "gpu")]
const BACKEND: &str = "software (rayon), OpenGL (glow)";
#[cfg(not(feature = "gpu"))]
const BACKEND: &str = "software (rayon)";

/// Headless timeline compositor
///
/// Every FILE becomes a still clip on its own video track, later files on
/// top. Frames are written to the output directory as PNG.
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Images to stack (PNG, JPEG, TIFF, TGA, EXR, HDR)
    #[arg(value_name = "FILE", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for rendered frames
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = "out")]
    pub output: PathBuf,

    /// Render a single frame
    #[arg(long = "frame", value_name = "N", conflicts_with = "range")]
    pub frame: Option<i64>,

    /// Render frames START..END (end exclusive)
    #[arg(long = "range", value_names = ["START", "END"], num_args = 2)]
    pub range: Option<Vec<i64>>,

    /// Sequence size
    #[arg(long = "size", value_names = ["W", "H"], num_args = 2)]
    pub size: Option<Vec<u32>>,

    /// Sequence frame rate
    #[arg(long = "fps", value_name = "FPS", default_value_t = DEFAULT_FPS)]
    pub fps: f64,

    /// Place the clips in a nested sequence running at this rate
    #[arg(long = "nested-fps", value_name = "FPS")]
    pub nested_fps: Option<f64>,

    /// Cross-dissolve each clip in over N frames
    #[arg(long = "fade", value_name = "N")]
    pub fade: Option<i64>,

    /// Add an audio clip for FILE and run the audio pass for every frame
    #[arg(long = "audio", value_name = "FILE")]
    pub audio: Option<PathBuf>,

    /// Disable shader effect stages
    #[arg(long = "no-shaders")]
    pub no_shaders: bool,

    /// Settings file (overrides NESTCOMP_CONFIG and the platform path)
    #[arg(short = 's', long = "settings", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Enable debug logging to file (default: nestcomp.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl Args {
    /// Frames to render, end exclusive
    pub fn frames(&self) -> std::ops::Range<i64> {
        if let Some(frame) = self.frame {
            return frame..frame + 1;
        }
        match self.range.as_deref() {
            Some(&[start, end]) => start..end.max(start),
            _ => 0..1,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self.size.as_deref() {
            Some(&[w, h]) if w > 0 && h > 0 => (w, h),
            _ => DEFAULT_DIM,
        }
    }
}
