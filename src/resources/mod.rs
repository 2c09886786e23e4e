//! Move-only owners of device objects.
//!
//! Each owner holds its device handles until it is dropped or released.
//! `take()` hands the handles to a new owner and leaves the source holding
//! [`crate::gpu::GpuHandle::EMPTY`], so dropping a moved-from owner issues
//! no device calls.

mod material;
mod mesh;
mod texture;
mod transform;

pub use material::{ShaderUniforms, SurfaceMaterial};
pub use mesh::{Mesh, VertexAttributes};
pub use texture::Texture;
pub use transform::Transform;
