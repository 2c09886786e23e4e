//! Point and spot lights mirrored into uniform buffers.
//!
//! Layouts follow std140: every `vec3` occupies a 16 byte slot, so the
//! structs below can be copied into the buffers byte for byte.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use log::debug;

use crate::error::{Error, Result};
use crate::gpu::{BufferUsage, Gpu, GpuHandle, UniformSlot, UniformValue};

/// Capacity of each light category.
pub const MAX_LIGHTS: usize = 5;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLight {
    pub position: [f32; 4],
    pub ambient_color: [f32; 3],
    _pad0: f32,
    pub diffuse_color: [f32; 3],
    _pad1: f32,
    pub specular_color: [f32; 3],
    _pad2: f32,
}

impl PointLight {
    pub fn new(position: Vec4, ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            position: position.to_array(),
            ambient_color: ambient.to_array(),
            _pad0: 0.0,
            diffuse_color: diffuse.to_array(),
            _pad1: 0.0,
            specular_color: specular.to_array(),
            _pad2: 0.0,
        }
    }
}

/// Cone light; `angle` is the cutoff half-angle in radians and shares the
/// last 16 byte slot with the specular color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpotLight {
    pub position: [f32; 4],
    pub direction: [f32; 3],
    _pad0: f32,
    pub ambient_color: [f32; 3],
    _pad1: f32,
    pub diffuse_color: [f32; 3],
    _pad2: f32,
    pub specular_color: [f32; 3],
    pub angle: f32,
}

impl SpotLight {
    pub fn new(
        position: Vec4,
        direction: Vec3,
        ambient: Vec3,
        diffuse: Vec3,
        specular: Vec3,
        angle: f32,
    ) -> Self {
        Self {
            position: position.to_array(),
            direction: direction.to_array(),
            _pad0: 0.0,
            ambient_color: ambient.to_array(),
            _pad1: 0.0,
            diffuse_color: diffuse.to_array(),
            _pad2: 0.0,
            specular_color: specular.to_array(),
            angle,
        }
    }
}

/// Where a light category is exposed to the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightBinding {
    /// Uniform buffer binding point the block is attached to.
    pub binding: u32,
    /// `int` uniform receiving the number of live lights.
    pub count_uniform: UniformSlot,
}

#[derive(Debug)]
struct LightSet<T> {
    category: &'static str,
    resource: &'static str,
    lights: Vec<T>,
    buffer: GpuHandle,
    binding: LightBinding,
}

impl<T: Pod> LightSet<T> {
    fn new(category: &'static str, resource: &'static str, binding: LightBinding) -> Self {
        Self {
            category,
            resource,
            lights: Vec::with_capacity(MAX_LIGHTS),
            buffer: GpuHandle::EMPTY,
            binding,
        }
    }

    fn allocate(&mut self, gpu: &Gpu) -> Result<()> {
        let size = std::mem::size_of::<T>() * MAX_LIGHTS;
        self.buffer = gpu.create_buffer(BufferUsage::Uniform, size);
        if self.buffer.is_empty() {
            return Err(Error::ResourceCreation {
                resource: self.resource,
            });
        }
        debug!(
            "allocated {} byte {} light buffer {}",
            size,
            self.category,
            self.buffer.raw()
        );
        Ok(())
    }

    fn push(&mut self, light: T) -> Result<()> {
        if self.lights.len() == MAX_LIGHTS {
            return Err(Error::CapacityExceeded {
                category: self.category,
                capacity: MAX_LIGHTS,
            });
        }
        self.lights.push(light);
        Ok(())
    }

    fn upload(&self, gpu: &Gpu) {
        if self.buffer.is_empty() {
            return;
        }
        if !self.lights.is_empty() {
            gpu.write_buffer(self.buffer, 0, bytemuck::cast_slice(&self.lights));
        }
        gpu.bind_buffer_base(self.binding.binding, self.buffer);
    }

    fn take(&mut self) -> Self {
        Self {
            category: self.category,
            resource: self.resource,
            lights: std::mem::take(&mut self.lights),
            buffer: self.buffer.take(),
            binding: self.binding,
        }
    }

    fn release(&mut self, gpu: &Gpu) {
        let buffer = self.buffer.take();
        if !buffer.is_empty() {
            gpu.delete_buffer(buffer);
        }
    }
}

/// Bounded point and spot light lists with their uniform buffers.
///
/// Per frame: [`LightBuffers::send_data_into_gpu`] before the shader is
/// activated, then [`LightBuffers::send_data_into_shader`] while it is
/// active.
pub struct LightBuffers {
    gpu: Gpu,
    point: LightSet<PointLight>,
    spot: LightSet<SpotLight>,
}

impl LightBuffers {
    pub fn new(gpu: Gpu, point: LightBinding, spot: LightBinding) -> Result<Self> {
        let mut buffers = Self {
            gpu,
            point: LightSet::new("point", "point lights buffer", point),
            spot: LightSet::new("spot", "spot lights buffer", spot),
        };
        buffers.point.allocate(&buffers.gpu)?;
        buffers.spot.allocate(&buffers.gpu)?;
        Ok(buffers)
    }

    pub fn add_point_light(&mut self, light: PointLight) -> Result<()> {
        self.point.push(light)
    }

    pub fn add_spot_light(&mut self, light: SpotLight) -> Result<()> {
        self.spot.push(light)
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point.lights
    }

    pub fn spot_lights(&self) -> &[SpotLight] {
        &self.spot.lights
    }

    pub fn point_light_buffer(&self) -> GpuHandle {
        self.point.buffer
    }

    pub fn spot_light_buffer(&self) -> GpuHandle {
        self.spot.buffer
    }

    /// Copies the live prefix of each list into its buffer and attaches the
    /// buffer to its binding point.
    pub fn send_data_into_gpu(&self) {
        self.point.upload(&self.gpu);
        self.spot.upload(&self.gpu);
    }

    /// Writes the light counts into the active program.
    pub fn send_data_into_shader(&self) {
        for (binding, len) in [
            (self.point.binding, self.point.lights.len()),
            (self.spot.binding, self.spot.lights.len()),
        ] {
            self.gpu
                .set_uniform(binding.count_uniform, UniformValue::Int(len as i32));
        }
    }

    /// Moves the buffers and lists out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        Self {
            gpu: self.gpu.clone(),
            point: self.point.take(),
            spot: self.spot.take(),
        }
    }
}

impl std::fmt::Debug for LightBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightBuffers")
            .field("point", &self.point)
            .field("spot", &self.spot)
            .finish()
    }
}

impl Drop for LightBuffers {
    fn drop(&mut self) {
        self.point.release(&self.gpu);
        self.spot.release(&self.gpu);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::shader::SCENE_PROGRAM;
    use crate::gpu::{HeadlessDevice, ObjectKind, ShaderProgram};

    fn bindings(shader: &ShaderProgram) -> (LightBinding, LightBinding) {
        (
            LightBinding {
                binding: 0,
                count_uniform: shader.require_uniform("num_point_lights").unwrap(),
            },
            LightBinding {
                binding: 1,
                count_uniform: shader.require_uniform("num_spot_lights").unwrap(),
            },
        )
    }

    fn point(x: f32) -> PointLight {
        PointLight::new(Vec4::new(x, 1.0, 0.0, 1.0), Vec3::splat(0.3), Vec3::ONE, Vec3::ONE)
    }

    #[test]
    fn layouts_match_std140() {
        assert_eq!(std::mem::size_of::<PointLight>(), 64);
        assert_eq!(std::mem::size_of::<SpotLight>(), 80);
        assert_eq!(std::mem::offset_of!(SpotLight, angle), 76);
    }

    #[test]
    fn sixth_light_is_rejected() {
        let device = Arc::new(HeadlessDevice::new());
        let gpu: Gpu = device.clone();
        let shader = ShaderProgram::new(gpu.clone(), &SCENE_PROGRAM).unwrap();
        let (p, s) = bindings(&shader);
        let mut lights = LightBuffers::new(gpu, p, s).unwrap();
        for i in 0..MAX_LIGHTS {
            lights.add_point_light(point(i as f32)).unwrap();
        }
        let err = lights.add_point_light(point(9.0)).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                category: "point",
                capacity: 5
            }
        ));
        assert_eq!(lights.point_lights().len(), MAX_LIGHTS);
    }

    #[test]
    fn upload_writes_only_live_lights() {
        let device = Arc::new(HeadlessDevice::new());
        let gpu: Gpu = device.clone();
        let shader = ShaderProgram::new(gpu.clone(), &SCENE_PROGRAM).unwrap();
        let (p, s) = bindings(&shader);
        let mut lights = LightBuffers::new(gpu, p, s).unwrap();
        lights.add_point_light(point(15.0)).unwrap();
        lights.add_point_light(point(-15.0)).unwrap();

        device.clear_calls();
        lights.send_data_into_gpu();

        let contents = device.buffer_contents(lights.point_light_buffer()).unwrap();
        assert_eq!(contents.len(), 64 * MAX_LIGHTS);
        let uploaded: Vec<PointLight> = contents[..128]
            .chunks_exact(64)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(uploaded, lights.point_lights());
        assert!(contents[128..].iter().all(|byte| *byte == 0));

        let writes = device
            .calls()
            .into_iter()
            .filter(|call| matches!(call, crate::gpu::DeviceCall::WriteBuffer { .. }))
            .count();
        assert_eq!(writes, 1, "empty spot list must not be uploaded");
        assert_eq!(device.bound_buffer(0), lights.point_light_buffer());
        assert_eq!(device.bound_buffer(1), lights.spot_light_buffer());
    }

    #[test]
    fn counts_reach_the_active_program() {
        let device = Arc::new(HeadlessDevice::new());
        let gpu: Gpu = device.clone();
        let shader = ShaderProgram::new(gpu.clone(), &SCENE_PROGRAM).unwrap();
        let (p, s) = bindings(&shader);
        let mut lights = LightBuffers::new(gpu, p, s).unwrap();
        lights.add_point_light(point(1.0)).unwrap();
        lights
            .add_spot_light(SpotLight::new(
                Vec4::W,
                Vec3::NEG_Y,
                Vec3::ZERO,
                Vec3::ONE,
                Vec3::ONE,
                0.4,
            ))
            .unwrap();
        shader.set_active();
        lights.send_data_into_shader();
        assert_eq!(
            device.uniform(shader.handle(), "num_point_lights"),
            Some(UniformValue::Int(1))
        );
        assert_eq!(
            device.uniform(shader.handle(), "num_spot_lights"),
            Some(UniformValue::Int(1))
        );
    }

    #[test]
    fn failed_buffer_creation_leaves_nothing_behind() {
        let device = Arc::new(HeadlessDevice::new());
        let gpu: Gpu = device.clone();
        let shader = ShaderProgram::new(gpu.clone(), &SCENE_PROGRAM).unwrap();
        let (p, s) = bindings(&shader);
        device.fail_creation_of(ObjectKind::Buffer);
        let result = LightBuffers::new(gpu, p, s);
        assert!(matches!(result, Err(Error::ResourceCreation { .. })));
        assert_eq!(device.live_objects(), 1);
    }

    #[test]
    fn moved_from_manager_drops_silently() {
        let device = Arc::new(HeadlessDevice::new());
        let gpu: Gpu = device.clone();
        let shader = ShaderProgram::new(gpu.clone(), &SCENE_PROGRAM).unwrap();
        let (p, s) = bindings(&shader);
        let mut lights = LightBuffers::new(gpu, p, s).unwrap();
        lights.add_point_light(point(1.0)).unwrap();
        let moved = lights.take();
        assert!(lights.point_lights().is_empty());
        assert_eq!(moved.point_lights().len(), 1);

        device.clear_calls();
        lights.send_data_into_gpu();
        drop(lights);
        assert!(device.calls().is_empty());
        drop(moved);
        assert_eq!(device.live_objects(), 1);
    }
}
