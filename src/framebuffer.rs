/// 8-bit RGB triple as sampled from textures and written to sinks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale every channel by `light` (expected in [0, 1]), truncating.
    #[inline]
    pub fn shade(self, light: f32) -> Self {
        Self {
            r: (self.r as f32 * light) as u8,
            g: (self.g as f32 * light) as u8,
            b: (self.b as f32 * light) as u8,
        }
    }

    #[inline]
    pub fn pack(self) -> u32 {
        pack_rgb(self.r, self.g, self.b)
    }
}

#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    // 0RGB, what softbuffer expects
    (b as u32) | ((g as u32) << 8) | ((r as u32) << 16)
}

#[cfg(test)]
pub fn unpack_rgb(c: u32) -> Rgb {
    Rgb::new((c >> 16) as u8, (c >> 8) as u8, c as u8)
}

/// Anything the column renderer can write pixels into.
///
/// Sinks own clipping: coordinates outside the surface must be ignored.
pub trait PixelSink {
    fn put_pixel(&mut self, x: i32, y: i32, color: Rgb);
}

/// Row-major in-memory surface of packed 0RGB pixels.
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self, color: Rgb) {
        self.pixels.fill(color.pack());
    }

    #[cfg(test)]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(unpack_rgb(self.pixels[y * self.width + x]))
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }
}

impl PixelSink for Framebuffer {
    #[inline]
    fn put_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        self.pixels[y as usize * self.width + x as usize] = color.pack();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_layout_is_0rgb() {
        assert_eq!(pack_rgb(0x12, 0x34, 0x56), 0x0012_3456);
        assert_eq!(unpack_rgb(0x0012_3456), Rgb::new(0x12, 0x34, 0x56));
    }

    #[test]
    fn shade_truncates_channels() {
        let c = Rgb::new(255, 101, 3).shade(0.5);
        assert_eq!(c, Rgb::new(127, 50, 1));
        assert_eq!(Rgb::new(9, 9, 9).shade(0.0), Rgb::BLACK);
    }

    #[test]
    fn out_of_surface_writes_are_ignored() {
        let mut fb = Framebuffer::new(4, 3);
        fb.put_pixel(-1, 0, Rgb::new(1, 2, 3));
        fb.put_pixel(4, 0, Rgb::new(1, 2, 3));
        fb.put_pixel(0, 3, Rgb::new(1, 2, 3));
        assert!(fb.pixels().iter().all(|&p| p == 0));

        fb.put_pixel(3, 2, Rgb::new(1, 2, 3));
        assert_eq!(fb.get(3, 2), Some(Rgb::new(1, 2, 3)));
        assert_eq!(fb.get(4, 2), None);
    }

    #[test]
    fn clear_fills_every_pixel() {
        let mut fb = Framebuffer::new(2, 2);
        fb.clear(Rgb::new(10, 20, 30));
        assert!(fb.pixels().iter().all(|&p| p == pack_rgb(10, 20, 30)));
    }
}
