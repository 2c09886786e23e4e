//! Handle-based graphics device abstraction.
//!
//! Every GPU object the viewer owns is addressed through an opaque
//! [`GpuHandle`]. The value `0` is the empty sentinel: it marks objects that
//! were never created (the device refused) or that have already been
//! released. Owners in [`crate::resources`] rely on this to make teardown
//! idempotent.

pub mod headless;
pub mod native;
pub mod shader;

use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};

pub use headless::{DeviceCall, DrawRecord, HeadlessDevice, ObjectKind};
pub use native::WgpuDevice;
pub use shader::{ProgramSource, ShaderProgram};

/// Shared reference to the active graphics device.
pub type Gpu = Arc<dyn GraphicsDevice>;

/// Opaque name of a device object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GpuHandle(u32);

impl GpuHandle {
    pub const EMPTY: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Moves the handle out, leaving the empty sentinel behind.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgb8,
    Rgba8,
    Depth24Stencil8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Depth24Stencil8 => 4,
        }
    }

    pub fn is_color(self) -> bool {
        !matches!(self, Self::Depth24Stencil8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// Pixel data and storage description for a texture upload.
#[derive(Debug, Clone, Copy)]
pub struct TextureImage<'a> {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// `None` allocates storage without initializing it.
    pub pixels: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    Incomplete(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR_DEPTH: Self = Self {
        color: true,
        depth: true,
    };
}

/// One vertex attribute stream sourced from a tightly packed float buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub buffer: GpuHandle,
    pub components: u32,
}

/// Location of a uniform within the active program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformSlot(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    /// std140 byte image of the value; `mat3` columns are padded to `vec4`.
    pub fn to_std140(&self) -> Vec<u8> {
        match self {
            Self::Int(value) => value.to_ne_bytes().to_vec(),
            Self::Float(value) => value.to_ne_bytes().to_vec(),
            Self::Vec3(value) => bytemuck::cast_slice(&value.to_array()).to_vec(),
            Self::Mat3(value) => {
                let cols = value.to_cols_array_2d();
                let padded: Vec<f32> = cols
                    .iter()
                    .flat_map(|col| [col[0], col[1], col[2], 0.0])
                    .collect();
                bytemuck::cast_slice(&padded).to_vec()
            }
            Self::Mat4(value) => bytemuck::cast_slice(&value.to_cols_array()).to_vec(),
        }
    }
}

/// GL-style command surface shared by every backend.
///
/// Creation calls return [`GpuHandle::EMPTY`] on failure; deletion calls
/// ignore the empty handle. Only one program and one framebuffer are bound
/// at a time, and uniform writes apply to the bound program.
pub trait GraphicsDevice: Send + Sync {
    fn create_buffer(&self, usage: BufferUsage, size: usize) -> GpuHandle;
    fn write_buffer(&self, buffer: GpuHandle, offset: usize, data: &[u8]);
    /// Binds `buffer` to an indexed uniform binding point.
    fn bind_buffer_base(&self, binding: u32, buffer: GpuHandle);
    fn delete_buffer(&self, buffer: GpuHandle);

    fn create_vertex_array(&self, attributes: &[VertexAttribute]) -> GpuHandle;
    fn delete_vertex_array(&self, vertex_array: GpuHandle);

    fn create_texture(&self) -> GpuHandle;
    fn texture_image(&self, texture: GpuHandle, image: &TextureImage<'_>);
    fn texture_filter(&self, texture: GpuHandle, filter: FilterMode);
    fn texture_wrap(&self, texture: GpuHandle, wrap: WrapMode);
    /// Binds `texture` to a sampler unit; the empty handle unbinds.
    fn bind_texture(&self, unit: u32, texture: GpuHandle);
    fn delete_texture(&self, texture: GpuHandle);

    fn create_framebuffer(&self) -> GpuHandle;
    fn framebuffer_attachments(
        &self,
        framebuffer: GpuHandle,
        color: GpuHandle,
        depth_stencil: GpuHandle,
    ) -> FramebufferStatus;
    /// Redirects draws; the empty handle selects the default target.
    fn bind_framebuffer(&self, framebuffer: GpuHandle);
    fn clear(&self, mask: ClearMask);
    fn delete_framebuffer(&self, framebuffer: GpuHandle);

    fn create_program(&self, source: &'static ProgramSource) -> GpuHandle;
    fn attribute_location(&self, program: GpuHandle, name: &str) -> Option<u32>;
    fn uniform_location(&self, program: GpuHandle, name: &str) -> Option<UniformSlot>;
    fn uniform_block_index(&self, program: GpuHandle, name: &str) -> Option<u32>;
    fn uniform_block_binding(&self, program: GpuHandle, block: u32, binding: u32);
    /// Activates `program`; the empty handle deactivates.
    fn use_program(&self, program: GpuHandle);
    fn set_uniform(&self, slot: UniformSlot, value: UniformValue);
    fn delete_program(&self, program: GpuHandle);

    fn draw_arrays(&self, vertex_array: GpuHandle, first: u32, count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_leaves_empty_sentinel() {
        let mut handle = GpuHandle::new(7);
        let moved = handle.take();
        assert_eq!(moved.raw(), 7);
        assert!(handle.is_empty());
        assert!(handle.take().is_empty());
    }

    #[test]
    fn mat3_std140_pads_columns() {
        let bytes = UniformValue::Mat3(Mat3::IDENTITY).to_std140();
        assert_eq!(bytes.len(), 48);
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(&floats[0..4], &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&floats[4..8], &[0.0, 1.0, 0.0, 0.0]);
    }
}
