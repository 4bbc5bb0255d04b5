use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
};

/// Colour of the bars around the letterboxed image.
const BORDER: u32 = 0;

/// Where the scaled image lands inside the window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

/// Precomputed mapping from window pixels to logical framebuffer pixels.
pub struct ScaleLut {
    dst_w: usize,
    dst_h: usize,
    viewport: Viewport,
    src_x: Vec<usize>, // one entry per viewport column
    src_y: Vec<usize>, // one entry per viewport row
}

impl ScaleLut {
    pub fn empty() -> Self {
        Self {
            dst_w: 0,
            dst_h: 0,
            viewport: Viewport::default(),
            src_x: Vec::new(),
            src_y: Vec::new(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn matches(&self, dst_w: usize, dst_h: usize) -> bool {
        self.dst_w == dst_w && self.dst_h == dst_h
    }
}

/// Fit `src` into `dst` at the largest scale that keeps its aspect ratio,
/// centring it and leaving bars on the remaining sides.
pub fn build_scale_lut(dst_w: usize, dst_h: usize, src_w: usize, src_h: usize) -> ScaleLut {
    if dst_w == 0 || dst_h == 0 || src_w == 0 || src_h == 0 {
        return ScaleLut::empty();
    }

    let scale = (dst_w as f32 / src_w as f32).min(dst_h as f32 / src_h as f32);
    let vw = ((src_w as f32 * scale).round() as usize).clamp(1, dst_w);
    let vh = ((src_h as f32 * scale).round() as usize).clamp(1, dst_h);
    let viewport = Viewport {
        x: (dst_w - vw) / 2,
        y: (dst_h - vh) / 2,
        w: vw,
        h: vh,
    };

    let src_x = (0..vw).map(|x| (x * src_w / vw).min(src_w - 1)).collect();
    let src_y = (0..vh).map(|y| (y * src_h / vh).min(src_h - 1)).collect();

    ScaleLut {
        dst_w,
        dst_h,
        viewport,
        src_x,
        src_y,
    }
}

/// Parallel nearest-neighbour stretch of `src` (row stride `sw`) into `dst`.
/// Rows are processed in parallel for cache friendly writes.
pub fn blit_letterboxed(dst: &mut [u32], src: &[u32], sw: usize, lut: &ScaleLut) {
    let dw = lut.dst_w;
    if dw == 0 {
        return;
    }
    let vp = lut.viewport;

    dst.par_chunks_mut(dw).enumerate().for_each(|(y, dst_row)| {
        if y < vp.y || y >= vp.y + vp.h {
            dst_row.fill(BORDER);
            return;
        }

        let row0 = lut.src_y[y - vp.y] * sw;
        let (left, rest) = dst_row.split_at_mut(vp.x);
        let (mid, right) = rest.split_at_mut(vp.w);
        left.fill(BORDER);
        right.fill(BORDER);
        for (d, &sx) in mid.iter_mut().zip(&lut.src_x) {
            *d = src[row0 + sx];
        }
    });
}
