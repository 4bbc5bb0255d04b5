use thiserror::Error;

use crate::camera::{Camera, length};
use crate::texture::TextureHandle;

/// Errors raised while validating a level
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("grid has no cells")]
    Empty,
    #[error("grid row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("border cell ({x}, {y}) is open; the grid must be enclosed by walls")]
    OpenBorder { x: usize, y: usize },
    #[error("cell ({x}, {y}) uses material {material} but only {available} textures are listed")]
    UnknownMaterial {
        x: usize,
        y: usize,
        material: usize,
        available: usize,
    },
    #[error("camera at ({x}, {y}) is outside the grid")]
    CameraOutside { x: f32, y: f32 },
    #[error("camera at ({x}, {y}) starts inside a wall")]
    CameraInWall { x: f32, y: f32 },
    #[error("camera direction has zero length")]
    DegenerateDirection,
    #[error("level parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static wall layout. Indexed `[x][y]`: `0` is open floor, `v > 0` is a
/// wall drawn with material `v - 1`.
#[derive(Clone, Debug)]
pub struct GridMap {
    width: usize,  // extent along x
    height: usize, // extent along y
    cells: Vec<u8>,
}

impl GridMap {
    /// `rows[x][y]`. Fails unless the grid is rectangular and fully enclosed.
    pub fn new(rows: Vec<Vec<u8>>) -> Result<Self, LevelError> {
        let width = rows.len();
        let height = rows.first().map_or(0, Vec::len);
        if width == 0 || height == 0 {
            return Err(LevelError::Empty);
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row, r) in rows.into_iter().enumerate() {
            if r.len() != height {
                return Err(LevelError::Ragged {
                    row,
                    expected: height,
                    found: r.len(),
                });
            }
            cells.extend(r);
        }

        let map = Self {
            width,
            height,
            cells,
        };

        for x in 0..width {
            for y in 0..height {
                let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                if border && map.cells[x * height + y] == 0 {
                    return Err(LevelError::OpenBorder { x, y });
                }
            }
        }

        Ok(map)
    }

    /// The 10x20 two-material demo level.
    pub fn demo() -> Self {
        #[rustfmt::skip]
        let rows: [[u8; 20]; 10] = [
            [2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1],
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            [2, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 2, 0, 0, 0, 0, 0, 2, 0, 0, 1],
            [2, 0, 0, 0, 0, 1, 1, 1, 0, 1, 2, 0, 0, 0, 0, 0, 2, 0, 0, 1],
            [1, 0, 0, 0, 0, 1, 0, 0, 0, 2, 2, 2, 2, 2, 2, 2, 2, 0, 0, 1],
            [2, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            [1, 0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            [2, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            [1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
        ];
        Self {
            width: rows.len(),
            height: rows[0].len(),
            cells: rows.iter().flatten().copied().collect(),
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Cell value, `None` outside the grid.
    #[inline]
    pub fn cell(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.cells[x as usize * self.height + y as usize])
    }

    /// Out-of-grid counts as blocked.
    #[inline]
    pub fn is_open(&self, x: i32, y: i32) -> bool {
        self.cell(x, y) == Some(0)
    }

    fn check_materials(&self, available: usize) -> Result<(), LevelError> {
        for x in 0..self.width {
            for y in 0..self.height {
                let v = self.cells[x * self.height + y];
                if v > 0 && v as usize > available {
                    return Err(LevelError::UnknownMaterial {
                        x,
                        y,
                        material: v as usize - 1,
                        available,
                    });
                }
            }
        }
        Ok(())
    }
}

/// A validated level: grid, starting camera and the texture file for each material.
#[derive(Clone, Debug)]
pub struct Level {
    pub map: GridMap,
    pub camera: Camera,
    pub textures: Vec<String>,
}

impl Level {
    pub fn new(map: GridMap, camera: Camera, textures: Vec<String>) -> Result<Self, LevelError> {
        map.check_materials(textures.len())?;

        let [x, y] = camera.pos;
        let (cx, cy) = camera.cell();
        match map.cell(cx, cy) {
            None => return Err(LevelError::CameraOutside { x, y }),
            Some(v) if v != 0 => return Err(LevelError::CameraInWall { x, y }),
            Some(_) => {}
        }
        if length(camera.dir) == 0.0 {
            return Err(LevelError::DegenerateDirection);
        }

        Ok(Self {
            map,
            camera,
            textures,
        })
    }

    pub fn demo() -> Self {
        Self {
            map: GridMap::demo(),
            camera: Camera::new([2.0, 2.0], [-1.0, 0.0], [0.0, 0.66]),
            textures: vec!["steel.bmp".to_string(), "bricks.bmp".to_string()],
        }
    }
}

/// Everything a frame reads: owned by the driver, mutated only by the
/// movement controller between frames.
pub struct World {
    pub map: GridMap,
    pub camera: Camera,
    /// Texture for material id `i` (grid value `i + 1`).
    pub materials: Vec<TextureHandle>,
}

impl World {
    pub fn new(level: Level, materials: Vec<TextureHandle>) -> Self {
        Self {
            map: level.map,
            camera: level.camera,
            materials,
        }
    }

    #[inline]
    pub fn material(&self, id: usize) -> TextureHandle {
        self.materials
            .get(id)
            .copied()
            .unwrap_or(TextureHandle::INVALID)
    }
}
