#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub pos: [f32; 2],   // (x, y) position in grid units
    pub dir: [f32; 2],   // facing direction
    pub plane: [f32; 2], // camera plane, perpendicular to dir; |plane| / |dir| sets the FOV
}

impl Camera {
    pub fn new(pos: [f32; 2], dir: [f32; 2], plane: [f32; 2]) -> Self {
        Self { pos, dir, plane }
    }

    /// Build the plane from a horizontal field of view.
    ///
    /// The plane is placed to the right of `dir` in screen terms, so that
    /// `dir = (-1, 0)` yields a plane along +Y.
    pub fn with_fov(pos: [f32; 2], dir: [f32; 2], fov_x_deg: f32) -> Self {
        let half = 0.5 * fov_x_deg.to_radians();
        let k = half.tan();
        Self {
            pos,
            dir,
            plane: [dir[1] * k, -dir[0] * k],
        }
    }

    /// Horizontal field of view in degrees implied by dir and plane.
    pub fn fov_degrees(&self) -> f32 {
        let ratio = length(self.plane) / length(self.dir);
        (2.0 * ratio.atan()).to_degrees()
    }

    /// Rotate dir and plane together by `angle` radians (positive is a left turn).
    pub fn rotate(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        self.dir = rotate(self.dir, c, s);
        self.plane = rotate(self.plane, c, s);
    }

    /// Direction of the ray through camera-space offset `u` in [-1, 1].
    #[inline]
    pub fn ray_dir(&self, u: f32) -> [f32; 2] {
        [
            self.dir[0] + self.plane[0] * u,
            self.dir[1] + self.plane[1] * u,
        ]
    }

    /// Grid cell containing the camera.
    #[inline]
    pub fn cell(&self) -> (i32, i32) {
        (self.pos[0].floor() as i32, self.pos[1].floor() as i32)
    }
}

#[inline]
fn rotate(v: [f32; 2], c: f32, s: f32) -> [f32; 2] {
    [v[0] * c - v[1] * s, v[0] * s + v[1] * c]
}

#[inline]
pub fn length(v: [f32; 2]) -> f32 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}
