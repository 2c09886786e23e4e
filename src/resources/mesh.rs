use log::debug;

use crate::assets::Geometry;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::gpu::{BufferUsage, Gpu, GpuHandle, ShaderProgram, UniformValue, VertexAttribute};
use crate::resources::{ShaderUniforms, SurfaceMaterial, Transform};

/// Attribute slots a mesh feeds; `None` skips the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexAttributes {
    pub position: Option<u32>,
    pub normal: Option<u32>,
    pub texel: Option<u32>,
}

impl VertexAttributes {
    /// Looks up `position`, `normal` and `texel` in the program.
    pub fn from_program(shader: &ShaderProgram) -> Self {
        Self {
            position: shader.attribute_location("position"),
            normal: shader.attribute_location("normal"),
            texel: shader.attribute_location("texel"),
        }
    }
}

/// Owning handle of an uploaded triangle list.
pub struct Mesh {
    gpu: Gpu,
    positions: GpuHandle,
    normals: GpuHandle,
    texels: GpuHandle,
    vertex_array: GpuHandle,
    vertex_count: u32,
}

impl Mesh {
    /// Uploads the three attribute streams once and records the vertex
    /// layout. On failure every object created so far is released.
    pub fn new(gpu: Gpu, geometry: &Geometry, attributes: &VertexAttributes) -> Result<Self> {
        let mut mesh = Self {
            gpu,
            positions: GpuHandle::EMPTY,
            normals: GpuHandle::EMPTY,
            texels: GpuHandle::EMPTY,
            vertex_array: GpuHandle::EMPTY,
            vertex_count: 0,
        };
        mesh.positions = mesh.upload(&geometry.positions, "vertices buffer")?;
        mesh.normals = mesh.upload(&geometry.normals, "normals buffer")?;
        mesh.texels = mesh.upload(&geometry.texels, "texels buffer")?;

        let streams = [
            (attributes.position, mesh.positions, 3),
            (attributes.normal, mesh.normals, 3),
            (attributes.texel, mesh.texels, 2),
        ];
        let layout: Vec<VertexAttribute> = streams
            .into_iter()
            .filter_map(|(location, buffer, components)| {
                location.map(|location| VertexAttribute {
                    location,
                    buffer,
                    components,
                })
            })
            .collect();
        mesh.vertex_array = mesh.gpu.create_vertex_array(&layout);
        if mesh.vertex_array.is_empty() {
            return Err(Error::ResourceCreation {
                resource: "mesh vertex array",
            });
        }
        mesh.vertex_count = geometry.vertex_count() as u32;
        debug!(
            "created mesh {} with {} vertices",
            mesh.vertex_array.raw(),
            mesh.vertex_count
        );
        Ok(mesh)
    }

    fn upload(&self, data: &[f32], resource: &'static str) -> Result<GpuHandle> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = self.gpu.create_buffer(BufferUsage::Vertex, bytes.len());
        if buffer.is_empty() {
            return Err(Error::ResourceCreation { resource });
        }
        self.gpu.write_buffer(buffer, 0, bytes);
        Ok(buffer)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn vertex_array(&self) -> GpuHandle {
        self.vertex_array
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_array.is_empty()
    }

    /// Writes matrices and material for `transform`, then draws every vertex.
    pub fn draw(
        &self,
        camera: &Camera,
        material: &SurfaceMaterial,
        transform: &Transform,
        uniforms: &ShaderUniforms,
    ) {
        let model = transform.matrix();
        let gpu = &self.gpu;
        gpu.set_uniform(uniforms.pvm_matrix, UniformValue::Mat4(camera.matrix() * model));
        gpu.set_uniform(
            uniforms.normal_matrix,
            UniformValue::Mat3(transform.normal_matrix()),
        );
        gpu.set_uniform(uniforms.model_matrix, UniformValue::Mat4(model));

        gpu.set_uniform(uniforms.ambient_color, UniformValue::Vec3(material.ambient));
        gpu.set_uniform(uniforms.diffuse_color, UniformValue::Vec3(material.diffuse));
        gpu.set_uniform(uniforms.specular_color, UniformValue::Vec3(material.specular));
        gpu.set_uniform(uniforms.shininess, UniformValue::Float(material.shininess));

        gpu.draw_arrays(self.vertex_array, 0, self.vertex_count);
    }

    /// Moves the mesh out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        Self {
            gpu: self.gpu.clone(),
            positions: self.positions.take(),
            normals: self.normals.take(),
            texels: self.texels.take(),
            vertex_array: self.vertex_array.take(),
            vertex_count: std::mem::take(&mut self.vertex_count),
        }
    }

    /// Deletes buffers and vertex array; calling it again does nothing.
    pub fn release(&mut self) {
        for buffer in [
            self.positions.take(),
            self.normals.take(),
            self.texels.take(),
        ] {
            if !buffer.is_empty() {
                self.gpu.delete_buffer(buffer);
            }
        }
        let vertex_array = self.vertex_array.take();
        if !vertex_array.is_empty() {
            self.gpu.delete_vertex_array(vertex_array);
        }
        self.vertex_count = 0;
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("vertex_array", &self.vertex_array)
            .field("vertex_count", &self.vertex_count)
            .finish()
    }
}
