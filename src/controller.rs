use crate::camera::Camera;
use crate::world::{GridMap, World};

/// Grid units per second.
pub const MOVE_SPEED: f32 = 5.0;
/// Radians per second.
pub const TURN_SPEED: f32 = 3.0;

/// Input sampled once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputFlags {
    pub forward: bool,
    pub backward: bool,
    pub turn_left: bool,
    pub turn_right: bool,
}

impl InputFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Advance the camera by `elapsed` seconds of input.
pub fn tick(world: &mut World, elapsed: f32, input: InputFlags) {
    let World { map, camera, .. } = world;
    step_camera(camera, map, elapsed, input);
}

pub fn step_camera(camera: &mut Camera, map: &GridMap, elapsed: f32, input: InputFlags) {
    let walk = MOVE_SPEED * elapsed;
    let turn = TURN_SPEED * elapsed;

    if input.forward {
        slide(camera, map, walk);
    }
    if input.backward {
        slide(camera, map, -walk);
    }

    // Left and right held together cancel out
    let spin = (input.turn_left as i8 - input.turn_right as i8) as f32;
    if spin != 0.0 {
        camera.rotate(spin * turn);
    }
}

/// Move `distance` along the facing direction, one axis at a time, so a blocked
/// axis does not stop motion along the other (wall sliding).
fn slide(camera: &mut Camera, map: &GridMap, distance: f32) {
    let next_x = camera.pos[0] + camera.dir[0] * distance;
    if map.is_open(next_x.floor() as i32, camera.pos[1].floor() as i32) {
        camera.pos[0] = next_x;
    }

    let next_y = camera.pos[1] + camera.dir[1] * distance;
    if map.is_open(camera.pos[0].floor() as i32, next_y.floor() as i32) {
        camera.pos[1] = next_y;
    }
}
