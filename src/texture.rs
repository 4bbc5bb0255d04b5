//! Wall textures: decoded texel storage, a fixed-capacity handle table and
//! the sampling interface the ray caster consumes.

use std::path::Path;

use thiserror::Error;

use crate::framebuffer::Rgb;

/// Number of texture slots in a [`TextureTable`].
pub const MAX_TEXTURES: usize = 5;

/// Side length of the procedural fallback textures.
const FALLBACK_SIZE: u32 = 64;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("texel buffer holds {actual} texels, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("all {0} texture slots are in use")]
    Exhausted(usize),
}

/// Decoded RGB texture, row-major.
#[derive(Clone, Debug)]
pub struct Texture {
    width: u32,
    height: u32,
    texels: Vec<Rgb>,
}

impl Texture {
    pub fn from_rgb(width: u32, height: u32, texels: Vec<Rgb>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(TextureError::BufferSizeMismatch {
                expected,
                actual: texels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Decode an image file (BMP, PNG, anything `image` understands).
    pub fn from_file(path: &Path) -> Result<Self, TextureError> {
        let img = image::open(path).map_err(|source| TextureError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_image(&img)
    }

    pub fn from_image(img: &image::DynamicImage) -> Result<Self, TextureError> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let texels = rgb
            .pixels()
            .map(|p| Rgb::new(p.0[0], p.0[1], p.0[2]))
            .collect();
        Self::from_rgb(width, height, texels)
    }

    /// Running-bond brick pattern, stand-in for `bricks.bmp`.
    pub fn bricks() -> Self {
        let size = FALLBACK_SIZE;
        let brick_w = 16;
        let brick_h = 8;
        let mut texels = Vec::with_capacity((size * size) as usize);

        for y in 0..size {
            for x in 0..size {
                let row = y / brick_h;
                let offset = if row % 2 == 0 { 0 } else { brick_w / 2 };
                let bx = (x + offset) % brick_w;
                let by = y % brick_h;

                if bx < 1 || by < 1 {
                    texels.push(Rgb::new(60, 56, 52));
                } else {
                    let brick_id = (row * 13 + ((x + offset) / brick_w) * 29) & 0x3F;
                    let v = (130 + brick_id) as f32;
                    texels.push(Rgb::new(v as u8, (v * 0.45) as u8, (v * 0.3) as u8));
                }
            }
        }

        Self {
            width: size,
            height: size,
            texels,
        }
    }

    /// Riveted plate pattern, stand-in for `steel.bmp`.
    pub fn steel() -> Self {
        let size = FALLBACK_SIZE;
        let plate = 32;
        let mut texels = Vec::with_capacity((size * size) as usize);

        for y in 0..size {
            for x in 0..size {
                let px = x % plate;
                let py = y % plate;
                let seam = px == 0 || py == 0;
                let rivet = (px == 4 || px == plate - 4) && (py == 4 || py == plate - 4);

                let c = if seam {
                    Rgb::new(70, 74, 80)
                } else if rivet {
                    Rgb::new(210, 214, 220)
                } else {
                    // faint vertical brushing
                    let v = 150 + ((x * 7 + y / 3) % 9) as u8;
                    Rgb::new(v - 10, v - 4, v)
                };
                texels.push(c);
            }
        }

        Self {
            width: size,
            height: size,
            texels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn texel(&self, x: i32, y: i32) -> Option<Rgb> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(self.texels[y as usize * self.width as usize + x as usize])
    }
}

/// Stable reference to a slot in a [`TextureTable`].
///
/// A released slot bumps its generation, so handles to the old texture
/// stop resolving instead of aliasing whatever is loaded next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    index: u32,
    generation: u32,
}

impl TextureHandle {
    pub const INVALID: TextureHandle = TextureHandle {
        index: u32::MAX,
        generation: 0,
    };

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Read side of texture storage, as seen by the ray caster.
pub trait TextureProvider {
    fn width(&self, handle: TextureHandle) -> Option<u32>;
    fn height(&self, handle: TextureHandle) -> Option<u32>;
    /// `None` for unknown handles and out-of-bounds coordinates.
    fn sample(&self, handle: TextureHandle, x: i32, y: i32) -> Option<Rgb>;
}

struct Slot {
    generation: u32,
    texture: Option<Texture>,
}

/// Fixed-capacity arena of textures with free-list reuse.
pub struct TextureTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl TextureTable {
    pub fn new() -> Self {
        Self::with_capacity(MAX_TEXTURES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                texture: None,
            })
            .collect();
        // Popped from the back, so the lowest index is handed out first
        let free = (0..capacity as u32).rev().collect();
        Self { slots, free }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a texture, returning [`TextureHandle::INVALID`] when every slot is taken.
    pub fn insert(&mut self, texture: Texture) -> TextureHandle {
        let Some(index) = self.free.pop() else {
            return TextureHandle::INVALID;
        };
        let slot = &mut self.slots[index as usize];
        slot.texture = Some(texture);
        TextureHandle {
            index,
            generation: slot.generation,
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<TextureHandle, TextureError> {
        if self.free.is_empty() {
            return Err(TextureError::Exhausted(self.capacity()));
        }
        let texture = Texture::from_file(path)?;
        tracing::debug!(
            path = %path.display(),
            width = texture.width(),
            height = texture.height(),
            "loaded texture"
        );
        Ok(self.insert(texture))
    }

    /// Free the slot behind `handle`. Invalid or stale handles are ignored.
    pub fn release(&mut self, handle: TextureHandle) {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return;
        };
        if slot.generation != handle.generation || slot.texture.is_none() {
            return;
        }
        slot.texture = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&Texture> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.texture.as_ref()
    }
}

impl Default for TextureTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureProvider for TextureTable {
    fn width(&self, handle: TextureHandle) -> Option<u32> {
        self.get(handle).map(Texture::width)
    }

    fn height(&self, handle: TextureHandle) -> Option<u32> {
        self.get(handle).map(Texture::height)
    }

    #[inline]
    fn sample(&self, handle: TextureHandle, x: i32, y: i32) -> Option<Rgb> {
        self.get(handle)?.texel(x, y)
    }
}
