//! Real-time viewer for a furnished room with a working planar mirror.
//!
//! The crate is built around a small handle-based graphics device
//! ([`gpu::GraphicsDevice`]) with a wgpu backend for the window and an
//! in-memory backend for tests and `--headless` runs. On top of it sit the
//! move-only resource owners, the light buffers, the mirror render target
//! and the [`Scene`] that ties them together every frame.

pub mod animation;
pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod error;
pub mod gpu;
pub mod input;
pub mod lights;
pub mod mirror;
pub mod resources;
pub mod rubik;
pub mod scene;

pub use animation::{Bounce, Levitation};
pub use app::{run_headless, run_interactive, HeadlessReport, WindowInitError};
pub use assets::{init_image_loader, AssetLoader, BuiltinAssets, DirectoryAssets, Geometry, Image};
pub use camera::Camera;
pub use config::ViewerConfig;
pub use error::{Error, Result};
pub use gpu::{Gpu, GpuHandle, GraphicsDevice, HeadlessDevice, WgpuDevice};
pub use input::{CameraInput, InputAction, KeyCode, MouseButton, NamedKey};
pub use lights::{LightBinding, LightBuffers, PointLight, SpotLight, MAX_LIGHTS};
pub use mirror::Mirror;
pub use resources::{Mesh, ShaderUniforms, SurfaceMaterial, Texture, Transform};
pub use rubik::{Axis, RubikCube};
pub use scene::{Scene, TextureMode, WallTime};
