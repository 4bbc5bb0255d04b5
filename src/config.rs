//! Command line options and level files.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::camera::Camera;
use crate::world::{GridMap, Level, LevelError};

/// Logical render resolution.
pub const SCREEN_WIDTH: usize = 320;
pub const SCREEN_HEIGHT: usize = 240;

/// Grid ray-casting demo
#[derive(Parser, Debug, Clone)]
#[command(name = "grid-raycaster")]
#[command(about = "Textured first-person view of a tile grid, drawn by ray casting")]
pub struct Args {
    /// TOML level file (built-in demo level when omitted)
    #[arg(long)]
    pub level: Option<PathBuf>,

    /// Directory the level's texture files are resolved against
    #[arg(long, default_value = "assets")]
    pub assets: PathBuf,

    /// Window size as a multiple of the 320x240 render resolution
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..=8))]
    pub scale: u32,

    /// Target frame rate
    #[arg(long, default_value_t = 60.0)]
    pub fps: f32,

    /// Below this frame rate, simulated time slows down instead of jumping
    #[arg(long, default_value_t = 20.0)]
    pub min_fps: f32,

    /// Draw every column on the main thread instead of the rayon pool
    #[arg(long)]
    pub sequential: bool,
}

impl Args {
    /// Shortest frame, used for pacing.
    pub fn min_frame_time(&self) -> f32 {
        1.0 / self.fps.max(1.0)
    }

    /// Longest elapsed time fed to a single tick.
    pub fn max_frame_time(&self) -> f32 {
        1.0 / self.min_fps.max(1.0)
    }

    pub fn load_level(&self) -> Result<Level, LevelError> {
        match &self.level {
            Some(path) => load_level(path),
            None => Ok(Level::demo()),
        }
    }
}

/// On-disk level layout.
///
/// ```toml
/// textures = ["steel.bmp", "bricks.bmp"]
/// grid = [
///     [1, 1, 1],
///     [1, 0, 1],
///     [1, 1, 1],
/// ]
///
/// [camera]
/// position = [1.5, 1.5]
/// direction = [-1.0, 0.0]
/// fov_degrees = 66.0
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelFile {
    pub textures: Vec<String>,
    /// `grid[x][y]`
    pub grid: Vec<Vec<u8>>,
    pub camera: CameraFile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraFile {
    pub position: [f32; 2],
    pub direction: [f32; 2],
    /// Explicit camera plane. Takes precedence over `fov_degrees`.
    pub plane: Option<[f32; 2]>,
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
}

fn default_fov() -> f32 {
    66.0
}

impl LevelFile {
    pub fn into_level(self) -> Result<Level, LevelError> {
        let map = GridMap::new(self.grid)?;
        let c = self.camera;
        let camera = match c.plane {
            Some(plane) => Camera::new(c.position, c.direction, plane),
            None => Camera::with_fov(c.position, c.direction, c.fov_degrees),
        };
        Level::new(map, camera, self.textures)
    }
}

pub fn parse_level(content: &str) -> Result<Level, LevelError> {
    let file: LevelFile = toml::from_str(content)?;
    file.into_level()
}

pub fn load_level(path: &Path) -> Result<Level, LevelError> {
    let content = std::fs::read_to_string(path)?;
    let level = parse_level(&content)?;
    let (w, h) = level.map.size();
    tracing::info!(path = %path.display(), width = w, height = h, "loaded level");
    Ok(level)
}
