use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
};

use crate::framebuffer::{Framebuffer, PixelSink, Rgb};
use crate::texture::{TextureHandle, TextureProvider};
use crate::world::{GridMap, World};

/// Walls at or beyond this distance are fully dark.
pub const MAX_LIGHT: f32 = 10.0;

pub const CEILING: Rgb = Rgb::new(80, 80, 80);
pub const FLOOR: Rgb = Rgb::new(10, 10, 10);
/// Used when a wall's material has no loaded texture.
const UNTEXTURED: Rgb = Rgb::new(160, 0, 160);

/// Stand-in for 1/0 on axis-aligned rays. Finite so that `0 * DELTA_INF`
/// stays 0 instead of becoming NaN when the camera sits on a grid line.
const DELTA_INF: f32 = 1e30;

/// Which grid line the ray crossed on its final step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Crossed a line of constant x (an X-facing wall face)
    X,
    /// Crossed a line of constant y
    Y,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub map_x: i32,
    pub map_y: i32,
    pub side: Side,
    /// Distance along the camera's forward axis (no fisheye). Always positive.
    pub perp_dist: f32,
    /// `None` when the ray left the grid without meeting a wall.
    pub material: Option<usize>,
    /// Cells stepped through before the hit.
    pub steps: u32,
}

/// Walk the grid from `pos` along `ray_dir` (DDA) until a non-zero cell.
///
/// Terminates for any enclosed map. Leaving the grid counts as a hit on
/// the last cell crossed, so unenclosed maps still terminate.
pub fn cast_ray(map: &GridMap, pos: [f32; 2], ray_dir: [f32; 2]) -> RayHit {
    let mut map_x = pos[0].floor() as i32;
    let mut map_y = pos[1].floor() as i32;

    let delta_dist_x = if ray_dir[0] == 0.0 {
        DELTA_INF
    } else {
        (1.0 / ray_dir[0]).abs()
    };
    let delta_dist_y = if ray_dir[1] == 0.0 {
        DELTA_INF
    } else {
        (1.0 / ray_dir[1]).abs()
    };

    let (step_x, mut side_dist_x) = if ray_dir[0] < 0.0 {
        (-1, (pos[0] - map_x as f32) * delta_dist_x)
    } else {
        (1, (map_x as f32 + 1.0 - pos[0]) * delta_dist_x)
    };
    let (step_y, mut side_dist_y) = if ray_dir[1] < 0.0 {
        (-1, (pos[1] - map_y as f32) * delta_dist_y)
    } else {
        (1, (map_y as f32 + 1.0 - pos[1]) * delta_dist_y)
    };

    let mut steps = 0;
    let (side, material) = loop {
        // Ties go to Y
        let side = if side_dist_x < side_dist_y {
            side_dist_x += delta_dist_x;
            map_x += step_x;
            Side::X
        } else {
            side_dist_y += delta_dist_y;
            map_y += step_y;
            Side::Y
        };
        steps += 1;

        match map.cell(map_x, map_y) {
            Some(0) => {}
            Some(v) => break (side, Some(v as usize - 1)),
            None => break (side, None),
        }
    };

    let perp_dist = match side {
        Side::X => (map_x as f32 - pos[0] + (1 - step_x) as f32 * 0.5) / ray_dir[0],
        Side::Y => (map_y as f32 - pos[1] + (1 - step_y) as f32 * 0.5) / ray_dir[1],
    };
    // Standing on the face's grid line gives 0 / -d = -0.0; keep it
    // positive so the wall projects full height
    let perp_dist = if perp_dist > 0.0 {
        perp_dist
    } else {
        f32::MIN_POSITIVE
    };

    RayHit {
        map_x,
        map_y,
        side,
        perp_dist,
        material,
        steps,
    }
}

/// Distance shading factor in [0, 1].
#[inline]
pub fn light(dist: f32) -> f32 {
    (1.0 - dist / MAX_LIGHT).clamp(0.0, 1.0)
}

/// Everything needed to paint one screen column.
#[derive(Clone, Copy, Debug)]
pub struct ColumnSpan {
    pub hit: RayHit,
    pub line_start: i32,
    pub line_end: i32,
    pub texture: TextureHandle,
    pub tex_x: i32,
    /// Texel rows advanced per screen row
    pub tex_step: f32,
    /// Texel row at `line_start`, past any part of the wall clipped above the screen
    pub tex_start: f32,
}

pub fn cast_column<P>(world: &World, textures: &P, x: usize, width: usize, height: usize) -> ColumnSpan
where
    P: TextureProvider + ?Sized,
{
    let camera = &world.camera;
    let u = 2.0 * x as f32 / width as f32 - 1.0;
    let ray_dir = camera.ray_dir(u);
    let hit = cast_ray(&world.map, camera.pos, ray_dir);

    let h = height as i32;
    // Saturates to i32::MAX when the camera touches the wall
    let line_height = (height as f32 / hit.perp_dist) as i32;
    let line_start = (h / 2 - line_height / 2).max(0);
    let line_end = (line_height / 2).saturating_add(h / 2).min(h);

    let texture = hit
        .material
        .map_or(TextureHandle::INVALID, |id| world.material(id));
    let tex_w = textures.width(texture).unwrap_or(1) as i32;
    let tex_h = textures.height(texture).unwrap_or(1) as f32;

    let wall_x = match hit.side {
        Side::X => camera.pos[1] + hit.perp_dist * ray_dir[1],
        Side::Y => camera.pos[0] + hit.perp_dist * ray_dir[0],
    };
    let wall_x = wall_x - wall_x.floor();

    let mut tex_x = (wall_x * tex_w as f32) as i32;
    let mirrored = match hit.side {
        Side::X => ray_dir[0] > 0.0,
        Side::Y => ray_dir[1] < 0.0,
    };
    if mirrored {
        tex_x = tex_w - tex_x - 1;
    }

    let tex_step = tex_h / line_height.max(1) as f32;
    let tex_start =
        (line_start as f32 - height as f32 / 2.0 + line_height as f32 / 2.0) * tex_step;

    ColumnSpan {
        hit,
        line_start,
        line_end,
        texture,
        tex_x,
        tex_step,
        tex_start,
    }
}

/// Cast and paint screen column `x`. Rows whose texel cannot be sampled are left untouched.
pub fn draw_column<P, S>(world: &World, textures: &P, x: usize, width: usize, height: usize, sink: &mut S)
where
    P: TextureProvider + ?Sized,
    S: PixelSink + ?Sized,
{
    let span = cast_column(world, textures, x, width, height);
    let px = x as i32;
    let tex_h = textures.height(span.texture).map(|h| h as i32);
    let shade = light(span.hit.perp_dist);
    let mut tex_pos = span.tex_start;

    for y in 0..height as i32 {
        if y < span.line_start {
            sink.put_pixel(px, y, CEILING);
        } else if y > span.line_end {
            sink.put_pixel(px, y, FLOOR);
        } else {
            match tex_h {
                Some(tex_h) => {
                    let tex_y = (tex_pos as i32).rem_euclid(tex_h);
                    if let Some(c) = textures.sample(span.texture, span.tex_x, tex_y) {
                        sink.put_pixel(px, y, c.shade(shade));
                    }
                }
                None => sink.put_pixel(px, y, UNTEXTURED.shade(shade)),
            }
            tex_pos += span.tex_step;
        }
    }
}

/// Render a full frame, one column at a time, into any sink.
pub fn draw<P, S>(world: &World, textures: &P, sink: &mut S, width: usize, height: usize)
where
    P: TextureProvider + ?Sized,
    S: PixelSink + ?Sized,
{
    for x in 0..width {
        draw_column(world, textures, x, width, height, sink);
    }
}

/// One column of a column-major scratch buffer.
struct ColumnSink<'a> {
    pixels: &'a mut [u32],
}

impl PixelSink for ColumnSink<'_> {
    #[inline]
    fn put_pixel(&mut self, _x: i32, y: i32, color: Rgb) {
        if let Some(p) = usize::try_from(y).ok().and_then(|y| self.pixels.get_mut(y)) {
            *p = color.pack();
        }
    }
}

/// Renders columns in parallel, then transposes them into the framebuffer.
///
/// Produces the same pixels as [`draw`] over the same framebuffer contents.
#[derive(Default)]
pub struct ParallelRenderer {
    columns: Vec<u32>, // column-major, `height` pixels per column
}

impl ParallelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render<P>(&mut self, fb: &mut Framebuffer, world: &World, textures: &P)
    where
        P: TextureProvider + Sync + ?Sized,
    {
        let (w, h) = (fb.width(), fb.height());
        if w == 0 || h == 0 {
            return;
        }
        self.columns.resize(w * h, 0);

        // Columns only read the frame state, so they can run independently
        let src = fb.pixels();
        self.columns
            .par_chunks_mut(h)
            .enumerate()
            .for_each(|(x, col)| {
                for (y, p) in col.iter_mut().enumerate() {
                    *p = src[y * w + x];
                }
                let mut sink = ColumnSink { pixels: col };
                draw_column(world, textures, x, w, h, &mut sink);
            });

        let columns = &self.columns;
        fb.pixels_mut()
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, p) in row.iter_mut().enumerate() {
                    *p = columns[x * h + y];
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::controller::{self, InputFlags};
    use crate::texture::{Texture, TextureTable};
    use crate::world::Level;
    use proptest::prelude::*;

    const W: usize = 320;
    const H: usize = 240;
    const EPS: f32 = 1e-4;

    fn solid_world(color: Rgb) -> (World, TextureTable) {
        let mut table = TextureTable::new();
        let tex = Texture::from_rgb(64, 64, vec![color; 64 * 64]).unwrap();
        let h = table.insert(tex.clone());
        let h2 = table.insert(tex);
        (World::new(Level::demo(), vec![h, h2]), table)
    }

    /// Texel (x, y) has r = x, g = y.
    fn gradient_world() -> (World, TextureTable) {
        let mut texels = Vec::with_capacity(64 * 64);
        for y in 0..64u8 {
            for x in 0..64u8 {
                texels.push(Rgb::new(x, y, 0));
            }
        }
        let mut table = TextureTable::new();
        let tex = Texture::from_rgb(64, 64, texels).unwrap();
        let h = table.insert(tex.clone());
        let h2 = table.insert(tex);
        (World::new(Level::demo(), vec![h, h2]), table)
    }

    fn boxed(w: usize, h: usize) -> GridMap {
        let rows = (0..w)
            .map(|x| {
                (0..h)
                    .map(|y| u8::from(x == 0 || y == 0 || x == w - 1 || y == h - 1))
                    .collect()
            })
            .collect();
        GridMap::new(rows).unwrap()
    }

    #[test]
    fn center_ray_hits_left_border() {
        let map = GridMap::demo();
        let hit = cast_ray(&map, [2.0, 2.0], [-1.0, 0.0]);
        assert_eq!((hit.map_x, hit.map_y), (0, 2));
        assert_eq!(hit.side, Side::X);
        assert_eq!(hit.material, Some(1));
        // Distance is to the wall face on the line x = 1, not to the hit
        // cell's index x = 0, so it is 1.0 rather than 2.0
        assert!((hit.perp_dist - 1.0).abs() < EPS);
        assert_eq!(hit.steps, 2);
    }

    #[test]
    fn center_column_of_demo_scene() {
        let (world, table) = solid_world(Rgb::new(200, 100, 50));
        let span = cast_column(&world, &table, W / 2, W, H);
        assert_eq!((span.hit.map_x, span.hit.map_y), (0, 2));
        assert_eq!(span.texture, world.materials[1]);
        assert_eq!((span.line_start, span.line_end), (0, 240));
        assert!((light(span.hit.perp_dist) - 0.9).abs() < EPS);
    }

    #[test]
    fn on_axis_distance_is_euclidean() {
        let map = GridMap::demo();
        let hit = cast_ray(&map, [1.5, 2.5], [0.0, 1.0]);
        assert_eq!((hit.map_x, hit.map_y), (1, 19));
        assert_eq!(hit.side, Side::Y);
        assert!((hit.perp_dist - 16.5).abs() < EPS);
    }

    #[test]
    fn off_axis_distance_is_perpendicular() {
        // Rays fanned across a flat wall report the same forward distance
        let map = boxed(40, 20);
        let a = cast_ray(&map, [20.5, 2.0], [0.0, 1.0]);
        assert_eq!(a.map_y, 19);
        for dx in [0.3, -0.3] {
            let b = cast_ray(&map, [20.5, 2.0], [dx, 1.0]);
            assert_eq!((b.map_y, b.side), (19, Side::Y));
            assert!((a.perp_dist - b.perp_dist).abs() < EPS);
        }
    }

    #[test]
    fn exact_tie_steps_y_first() {
        let map = boxed(3, 3);
        let hit = cast_ray(&map, [1.5, 1.5], [1.0, 1.0]);
        assert_eq!(hit.side, Side::Y);
        assert_eq!((hit.map_x, hit.map_y), (1, 2));
        assert!((hit.perp_dist - 0.5).abs() < EPS);
    }

    #[test]
    fn axis_aligned_rays_terminate() {
        let map = GridMap::demo();
        for dir in [[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]] {
            let hit = cast_ray(&map, [2.0, 2.0], dir);
            assert!(hit.material.is_some());
            assert!(hit.perp_dist.is_finite());
        }
    }

    #[test]
    fn zero_ray_still_terminates() {
        let map = GridMap::demo();
        let hit = cast_ray(&map, [2.5, 2.5], [0.0, 0.0]);
        assert!(hit.steps <= 30);
    }

    #[test]
    fn light_range() {
        assert_eq!(light(0.0), 1.0);
        assert_eq!(light(MAX_LIGHT), 0.0);
        assert_eq!(light(25.0), 0.0);
        assert!((light(5.0) - 0.5).abs() < EPS);
    }

    #[test]
    fn texture_column_is_mirrored_on_far_faces() {
        let (mut world, table) = gradient_world();

        // West face, ray going -x: not mirrored
        world.camera = Camera::new([1.5, 2.25], [-1.0, 0.0], [0.0, 0.66]);
        let span = cast_column(&world, &table, W / 2, W, H);
        assert_eq!(span.hit.side, Side::X);
        assert_eq!(span.tex_x, 16);

        // East face, ray going +x: mirrored
        world.camera = Camera::new([8.5, 2.25], [1.0, 0.0], [0.0, -0.66]);
        let span = cast_column(&world, &table, W / 2, W, H);
        assert_eq!((span.hit.map_x, span.hit.side), (9, Side::X));
        assert_eq!(span.tex_x, 64 - 16 - 1);

        // Y face, ray going -y: mirrored
        world.camera = Camera::new([1.25, 2.5], [0.0, -1.0], [-0.66, 0.0]);
        let span = cast_column(&world, &table, W / 2, W, H);
        assert_eq!((span.hit.map_y, span.hit.side), (0, Side::Y));
        assert_eq!(span.tex_x, 64 - 16 - 1);
    }

    #[test]
    fn clipped_wall_starts_mid_texture() {
        let (mut world, table) = gradient_world();
        world.camera = Camera::new([1.5, 2.0], [-1.0, 0.0], [0.0, 0.66]);
        let span = cast_column(&world, &table, W / 2, W, H);
        assert_eq!(span.line_start, 0);
        assert!((span.tex_step - 64.0 / 480.0).abs() < EPS);
        assert!((span.tex_start - 16.0).abs() < EPS);

        let mut fb = Framebuffer::new(W, H);
        draw(&world, &table, &mut fb, W, H);
        // top row samples texel row 16, light is 0.95
        let top = fb.get(W / 2, 0).unwrap();
        assert_eq!(top.g, (16.0f32 * light(0.5)) as u8);
    }

    #[test]
    fn shaded_wall_pixels() {
        let (world, table) = solid_world(Rgb::new(200, 100, 50));
        let mut fb = Framebuffer::new(W, H);
        draw(&world, &table, &mut fb, W, H);
        assert_eq!(fb.get(W / 2, 0), Some(Rgb::new(180, 90, 45)));
        assert_eq!(fb.get(W / 2, H / 2), Some(Rgb::new(180, 90, 45)));
        assert_eq!(fb.get(W / 2, H - 1), Some(Rgb::new(180, 90, 45)));
    }

    #[test]
    fn distant_wall_leaves_ceiling_and_floor() {
        let (mut world, table) = solid_world(Rgb::new(200, 100, 50));
        world.camera = Camera::new([1.5, 2.5], [0.0, 1.0], [0.66, 0.0]);
        // 240 / 16.5 rounds down to a 14 row span
        let span = cast_column(&world, &table, W / 2, W, H);
        assert_eq!((span.line_start, span.line_end), (113, 127));

        let mut fb = Framebuffer::new(W, H);
        draw(&world, &table, &mut fb, W, H);
        assert_eq!(fb.get(W / 2, 0), Some(CEILING));
        assert_eq!(fb.get(W / 2, 112), Some(CEILING));
        assert_eq!(fb.get(W / 2, 120), Some(Rgb::BLACK));
        assert_eq!(fb.get(W / 2, 128), Some(FLOOR));
        assert_eq!(fb.get(W / 2, H - 1), Some(FLOOR));
    }

    #[test]
    fn camera_on_the_face_line_sees_a_full_height_wall() {
        let (mut world, table) = solid_world(Rgb::new(200, 100, 50));
        // Four clamped frames of walking from the demo start end exactly on x = 1
        let forward = InputFlags {
            forward: true,
            ..Default::default()
        };
        for _ in 0..4 {
            controller::tick(&mut world, 0.05, forward);
        }
        assert_eq!(world.camera.pos, [1.0, 2.0]);

        let hit = cast_ray(&world.map, world.camera.pos, [-1.0, 0.0]);
        assert_eq!((hit.map_x, hit.map_y), (0, 2));
        assert!(hit.perp_dist > 0.0);

        let span = cast_column(&world, &table, W / 2, W, H);
        assert_eq!((span.line_start, span.line_end), (0, 240));

        let mut fb = Framebuffer::new(W, H);
        draw(&world, &table, &mut fb, W, H);
        for y in [0, H / 2, H - 1] {
            assert_eq!(fb.get(W / 2, y), Some(Rgb::new(200, 100, 50)));
        }
    }

    #[test]
    fn zero_ray_distance_stays_positive() {
        let map = GridMap::demo();
        let hit = cast_ray(&map, [2.5, 2.5], [0.0, 0.0]);
        assert!(hit.perp_dist > 0.0);
    }

    #[test]
    fn missing_texture_draws_flat_color() {
        let world = World::new(Level::demo(), vec![]);
        let table = TextureTable::new();
        let mut fb = Framebuffer::new(W, H);
        draw(&world, &table, &mut fb, W, H);
        assert_eq!(fb.get(W / 2, H / 2), Some(UNTEXTURED.shade(0.9)));
    }

    #[test]
    fn parallel_matches_sequential() {
        let (mut world, table) = gradient_world();
        world.camera = Camera::new([6.3, 7.7], [0.6, 0.8], [0.528, -0.396]);

        let mut seq = Framebuffer::new(W, H);
        seq.clear(Rgb::new(1, 2, 3));
        draw(&world, &table, &mut seq, W, H);

        let mut par = Framebuffer::new(W, H);
        par.clear(Rgb::new(1, 2, 3));
        ParallelRenderer::new().render(&mut par, &world, &table);

        assert_eq!(seq.pixels(), par.pixels());
    }

    proptest! {
        #[test]
        fn ray_walk_is_bounded(
            x in 1.0f32..9.0,
            y in 1.0f32..19.0,
            angle in -3.2f32..3.2,
        ) {
            let map = GridMap::demo();
            prop_assume!(map.is_open(x.floor() as i32, y.floor() as i32));
            let hit = cast_ray(&map, [x, y], [angle.cos(), angle.sin()]);
            prop_assert!(hit.material.is_some());
            prop_assert!(hit.steps <= 10 + 20);
            prop_assert!(hit.perp_dist > 0.0);
        }

        #[test]
        fn light_stays_in_unit_range(d in 0.0f32..1000.0) {
            let l = light(d);
            prop_assert!((0.0..=1.0).contains(&l));
        }
    }
}
