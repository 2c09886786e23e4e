use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building the scene and its GPU resources.
///
/// Everything here is fatal to the construction that produced it; the
/// frame loop itself has no error path.
#[derive(Error, Debug)]
pub enum Error {
    /// The device handed back the empty handle for a new object.
    #[error("unable to create {resource}")]
    ResourceCreation { resource: &'static str },

    /// Off-screen target attachments did not form a complete framebuffer.
    #[error("unable to attach {width}x{height} framebuffer with color and depth textures: {reason}")]
    IncompleteRenderTarget {
        width: u32,
        height: u32,
        reason: &'static str,
    },

    /// A light category already holds its maximum number of entries.
    #[error("unable to add more {category} lights, reached maximum of {capacity}")]
    CapacityExceeded {
        category: &'static str,
        capacity: usize,
    },

    #[error("unable to load asset '{path}': {reason}")]
    AssetLoad { path: PathBuf, reason: String },

    #[error("unsupported image format in '{path}': {format}")]
    UnsupportedPixelFormat { path: PathBuf, format: String },

    /// `load_image` was called before `init_image_loader`.
    #[error("image loader used before initialization")]
    LoaderNotInitialized,

    /// The shader program does not expose a symbol the scene depends on.
    #[error("shader program does not expose '{name}'")]
    MissingShaderSymbol { name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn asset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::AssetLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
