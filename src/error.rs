use thiserror::Error;

use crate::texture::TextureError;
use crate::world::LevelError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Level error: {0}")]
    Level(#[from] LevelError),

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Window error: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("Surface error: {0}")]
    Surface(#[from] softbuffer::SoftBufferError),
}

pub type Result<T> = std::result::Result<T, AppError>;
