use std::num::NonZeroU32;
use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::{Args, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::controller::InputFlags;
use crate::error::AppError;
use crate::framebuffer::{Framebuffer, Rgb};
use crate::renderer::{ParallelRenderer, cast_ray, draw};
use crate::scaler::{ScaleLut, blit_letterboxed, build_scale_lut};
use crate::texture::{Texture, TextureError, TextureHandle, TextureTable};
use crate::world::{Level, World};

mod camera;
mod config;
mod controller;
mod error;
mod framebuffer;
mod renderer;
mod scaler;
mod texture;
mod world;

struct App {
    args: Args,
    window: Option<Rc<Window>>,
    surface: Option<softbuffer::Surface<Rc<Window>, Rc<Window>>>,
    world: World,
    textures: TextureTable,

    // Internal 320x240 buffer
    fb: Framebuffer,
    renderer: ParallelRenderer,
    scale_lut: ScaleLut,

    // Input and timing
    input: InputFlags,
    last_tick: Instant,
    next_frame: Instant,
    average_fps: f32,
    last_fps_log: Instant,

    // First fatal error raised inside the event loop
    error: Option<AppError>,
}

impl App {
    fn new(args: Args, world: World, textures: TextureTable) -> Self {
        let now = Instant::now();
        Self {
            args,
            window: None,
            surface: None,
            world,
            textures,

            fb: Framebuffer::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            renderer: ParallelRenderer::new(),
            scale_lut: ScaleLut::empty(),

            input: InputFlags::default(),
            last_tick: now,
            next_frame: now,
            average_fps: 0.0,
            last_fps_log: now,

            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        tracing::error!("{err}");
        if self.error.is_none() {
            self.error = Some(err);
        }
        event_loop.exit();
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let scale = self.args.scale as f64;
        let attributes = Window::default_attributes()
            .with_title("Grid Raycaster")
            .with_inner_size(LogicalSize::new(
                SCREEN_WIDTH as f64 * scale,
                SCREEN_HEIGHT as f64 * scale,
            ));

        let window = Rc::new(event_loop.create_window(attributes)?);
        let context = softbuffer::Context::new(window.clone())?;
        let surface = softbuffer::Surface::new(&context, window.clone())?;

        let size = window.inner_size();
        tracing::info!(width = size.width, height = size.height, "window created");
        self.scale_lut = build_scale_lut(
            size.width as usize,
            size.height as usize,
            SCREEN_WIDTH,
            SCREEN_HEIGHT,
        );

        self.surface = Some(surface);
        self.window = Some(window.clone());

        self.last_tick = Instant::now();
        window.request_redraw();
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match code {
            KeyCode::Escape if pressed => event_loop.exit(),
            KeyCode::ArrowUp => self.input.forward = pressed,
            KeyCode::ArrowDown => self.input.backward = pressed,
            KeyCode::ArrowLeft => self.input.turn_left = pressed,
            KeyCode::ArrowRight => self.input.turn_right = pressed,
            _ => (),
        }
    }

    /// Advance the simulation by the time since the last frame.
    fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.next_frame = now + Duration::from_secs_f32(self.args.min_frame_time());

        if dt > 0.0 {
            self.average_fps = self.average_fps * 0.99 + 0.01 / dt;
        }
        if now.duration_since(self.last_fps_log) >= Duration::from_secs(1) {
            tracing::debug!(fps = self.average_fps, "frame rate");
            self.last_fps_log = now;
        }

        // Slow the world down rather than letting a stall teleport the camera
        let dt = dt.min(self.args.max_frame_time());
        controller::tick(&mut self.world, dt, self.input);
    }

    fn redraw(&mut self, id: WindowId) -> Result<(), AppError> {
        self.tick();

        let (window, surface) = match (&self.window, &mut self.surface) {
            (Some(w), Some(s)) if w.id() == id => (w, s),
            _ => return Ok(()),
        };

        let size = window.inner_size();
        let (Some(dw), Some(dh)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            return Ok(()); // Minimized window, skip drawing
        };
        surface.resize(dw, dh)?;

        let (dw, dh) = (dw.get() as usize, dh.get() as usize);
        if !self.scale_lut.matches(dw, dh) {
            self.scale_lut = build_scale_lut(dw, dh, SCREEN_WIDTH, SCREEN_HEIGHT);
        }

        self.fb.clear(Rgb::BLACK);
        if self.args.sequential {
            draw(&self.world, &self.textures, &mut self.fb, SCREEN_WIDTH, SCREEN_HEIGHT);
        } else {
            self.renderer.render(&mut self.fb, &self.world, &self.textures);
        }

        let mut buf = surface.buffer_mut()?;
        blit_letterboxed(&mut buf, self.fb.pixels(), SCREEN_WIDTH, &self.scale_lut);
        buf.present()?;
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.create_window(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("close requested");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code, state),

            WindowEvent::Focused(false) => {
                // Key releases are not reported while unfocused
                tracing::debug!("focus lost, clearing input");
                self.input.clear();
            }

            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw(id) {
                    self.fail(event_loop, err);
                }
            }

            WindowEvent::Resized(new_size) => {
                self.scale_lut = build_scale_lut(
                    new_size.width as usize,
                    new_size.height as usize,
                    SCREEN_WIDTH,
                    SCREEN_HEIGHT,
                );
                tracing::debug!(
                    width = new_size.width,
                    height = new_size.height,
                    viewport = ?self.scale_lut.viewport(),
                    "resized"
                );
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            if Instant::now() >= self.next_frame {
                window.request_redraw();
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        for &handle in &self.world.materials {
            self.textures.release(handle);
        }
        if !self.textures.is_empty() {
            tracing::warn!(remaining = self.textures.len(), "textures still loaded at shutdown");
        }
        tracing::info!("shutting down");
    }
}

fn fallback_texture(name: &str) -> Texture {
    if name.contains("brick") {
        Texture::bricks()
    } else {
        Texture::steel()
    }
}

/// Load one texture per material, substituting a generated texture for
/// files that cannot be read.
fn load_materials(
    textures: &mut TextureTable,
    level: &Level,
    assets: &Path,
) -> Result<Vec<TextureHandle>, TextureError> {
    let mut materials = Vec::with_capacity(level.textures.len());
    for name in &level.textures {
        let path = assets.join(name);
        let handle = match textures.load(&path) {
            Ok(handle) => handle,
            Err(TextureError::Exhausted(n)) => return Err(TextureError::Exhausted(n)),
            Err(err) => {
                tracing::warn!("{err}; using generated texture for {name}");
                let handle = textures.insert(fallback_texture(name));
                if !handle.is_valid() {
                    return Err(TextureError::Exhausted(textures.capacity()));
                }
                handle
            }
        };
        materials.push(handle);
    }
    Ok(materials)
}

fn run(args: Args) -> error::Result<()> {
    tracing::info!(
        level = ?args.level,
        assets = %args.assets.display(),
        scale = args.scale,
        fps = args.fps,
        "starting"
    );

    let level = args.load_level()?;
    let mut textures = TextureTable::new();
    let materials = load_materials(&mut textures, &level, &args.assets)?;
    tracing::info!(loaded = textures.len(), capacity = textures.capacity(), "textures ready");

    let world = World::new(level, materials);
    tracing::info!(
        x = world.camera.pos[0],
        y = world.camera.pos[1],
        fov = world.camera.fov_degrees(),
        "camera ready"
    );
    let ahead = cast_ray(&world.map, world.camera.pos, world.camera.dir);
    tracing::debug!(
        cell_x = ahead.map_x,
        cell_y = ahead.map_y,
        distance = ahead.perp_dist,
        steps = ahead.steps,
        "facing wall"
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(args, world, textures);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("grid_raycaster=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_assets_fall_back_to_generated_textures() {
        let level = Level::demo();
        let mut textures = TextureTable::new();
        let materials =
            load_materials(&mut textures, &level, Path::new("no/such/assets")).unwrap();
        assert_eq!(materials.len(), 2);
        assert!(materials.iter().all(|h| h.is_valid()));
        assert_eq!(textures.len(), 2);
        assert_eq!(textures.get(materials[1]).map(Texture::width), Some(64));
    }

    #[test]
    fn exhaustion_reports_table_capacity() {
        let level = Level::demo();
        let mut textures = TextureTable::with_capacity(1);
        // One slot for two materials: the first falls back, the second has nowhere to go
        assert!(matches!(
            load_materials(&mut textures, &level, Path::new("no/such/assets")),
            Err(TextureError::Exhausted(1))
        ));
    }

    #[test]
    fn too_many_materials_is_an_error() {
        let mut level = Level::demo();
        level.textures = (0..6).map(|i| format!("t{i}.bmp")).collect();
        let mut textures = TextureTable::new();
        assert!(matches!(
            load_materials(&mut textures, &level, Path::new("no/such/assets")),
            Err(TextureError::Exhausted(5))
        ));
    }
}
