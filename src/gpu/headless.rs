//! In-memory graphics device.
//!
//! Keeps real byte storage for buffers, tracks bindings and uniform values
//! per program, and logs every call. Tests read state back through the
//! inspection methods; `--headless` runs the full frame loop on it.

use std::collections::{HashMap, HashSet};

use log::warn;
use parking_lot::Mutex;

use crate::gpu::{
    BufferUsage, ClearMask, FilterMode, FramebufferStatus, GpuHandle, GraphicsDevice,
    ProgramSource, TextureFormat, TextureImage, UniformSlot, UniformValue, VertexAttribute,
    WrapMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    VertexArray,
    Texture,
    Framebuffer,
    Program,
}

/// One logged device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Create(ObjectKind, GpuHandle),
    Delete(ObjectKind, GpuHandle),
    WriteBuffer {
        buffer: GpuHandle,
        offset: usize,
        len: usize,
    },
    BindBufferBase {
        binding: u32,
        buffer: GpuHandle,
    },
    TextureImage(GpuHandle),
    TextureParameter(GpuHandle),
    BindTexture {
        unit: u32,
        texture: GpuHandle,
    },
    Attach(GpuHandle),
    BindFramebuffer(GpuHandle),
    Clear(ClearMask),
    UseProgram(GpuHandle),
    BlockBinding {
        block: u32,
        binding: u32,
    },
    SetUniform(UniformSlot),
    Draw {
        vertex_array: GpuHandle,
        count: u32,
    },
}

/// Snapshot of the pipeline state at one draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub framebuffer: GpuHandle,
    pub program: GpuHandle,
    pub vertex_array: GpuHandle,
    pub first: u32,
    pub count: u32,
    pub texture: GpuHandle,
    pub texture_type: Option<i32>,
    /// Whether the program samples with `v` mirrored.
    pub flip_texel_v: bool,
}

#[derive(Debug, Clone)]
struct TextureState {
    width: u32,
    height: u32,
    format: Option<TextureFormat>,
    filter: FilterMode,
    wrap: WrapMode,
}

#[derive(Debug, Default)]
struct State {
    next_handle: u32,
    failing: HashSet<ObjectKind>,
    buffers: HashMap<GpuHandle, Vec<u8>>,
    vertex_arrays: HashMap<GpuHandle, Vec<VertexAttribute>>,
    textures: HashMap<GpuHandle, TextureState>,
    framebuffers: HashMap<GpuHandle, (GpuHandle, GpuHandle)>,
    programs: HashMap<GpuHandle, &'static ProgramSource>,
    block_bindings: HashMap<(GpuHandle, u32), u32>,
    buffer_bindings: HashMap<u32, GpuHandle>,
    texture_units: HashMap<u32, GpuHandle>,
    uniforms: HashMap<(GpuHandle, UniformSlot), UniformValue>,
    forced_incomplete: bool,
    framebuffer: GpuHandle,
    program: GpuHandle,
    draws: Vec<DrawRecord>,
    calls: Vec<DeviceCall>,
}

impl State {
    fn allocate(&mut self, kind: ObjectKind) -> GpuHandle {
        if self.failing.contains(&kind) {
            return GpuHandle::EMPTY;
        }
        self.next_handle += 1;
        let handle = GpuHandle::new(self.next_handle);
        self.calls.push(DeviceCall::Create(kind, handle));
        handle
    }

    fn int_uniform(&self, name: &str) -> Option<i32> {
        let source = self.programs.get(&self.program)?;
        let slot = source.uniform_slot(name)?;
        match self.uniforms.get(&(self.program, slot)) {
            Some(UniformValue::Int(value)) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    state: Mutex<State>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later creation of `kind` return the empty handle.
    pub fn fail_creation_of(&self, kind: ObjectKind) {
        self.state.lock().failing.insert(kind);
    }

    /// Makes every later framebuffer attachment report incompleteness.
    pub fn force_incomplete_framebuffers(&self) {
        self.state.lock().forced_incomplete = true;
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.lock().draws.clone()
    }

    pub fn clear_draws(&self) {
        self.state.lock().draws.clear();
    }

    /// Number of objects created and not yet deleted.
    pub fn live_objects(&self) -> usize {
        let state = self.state.lock();
        state.buffers.len()
            + state.vertex_arrays.len()
            + state.textures.len()
            + state.framebuffers.len()
            + state.programs.len()
    }

    pub fn buffer_contents(&self, buffer: GpuHandle) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).cloned()
    }

    pub fn bound_buffer(&self, binding: u32) -> GpuHandle {
        self.state
            .lock()
            .buffer_bindings
            .get(&binding)
            .copied()
            .unwrap_or_default()
    }

    pub fn block_binding(&self, program: GpuHandle, block: u32) -> Option<u32> {
        self.state
            .lock()
            .block_bindings
            .get(&(program, block))
            .copied()
    }

    /// Last value written to the uniform called `name` in `program`.
    pub fn uniform(&self, program: GpuHandle, name: &str) -> Option<UniformValue> {
        let state = self.state.lock();
        let slot = state.programs.get(&program)?.uniform_slot(name)?;
        state.uniforms.get(&(program, slot)).copied()
    }

    pub fn texture_size(&self, texture: GpuHandle) -> Option<(u32, u32)> {
        self.state
            .lock()
            .textures
            .get(&texture)
            .map(|texture| (texture.width, texture.height))
    }

    pub fn texture_sampling(&self, texture: GpuHandle) -> Option<(FilterMode, WrapMode)> {
        self.state
            .lock()
            .textures
            .get(&texture)
            .map(|texture| (texture.filter, texture.wrap))
    }

    pub fn current_framebuffer(&self) -> GpuHandle {
        self.state.lock().framebuffer
    }

    pub fn current_program(&self) -> GpuHandle {
        self.state.lock().program
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&self, _usage: BufferUsage, size: usize) -> GpuHandle {
        let mut state = self.state.lock();
        let handle = state.allocate(ObjectKind::Buffer);
        if !handle.is_empty() {
            state.buffers.insert(handle, vec![0; size]);
        }
        handle
    }

    fn write_buffer(&self, buffer: GpuHandle, offset: usize, data: &[u8]) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        let Some(storage) = state.buffers.get_mut(&buffer) else {
            warn!("write to unknown buffer {}", buffer.raw());
            return;
        };
        let end = offset + data.len();
        if end > storage.len() {
            warn!(
                "write of {} bytes at {offset} overflows buffer {} ({} bytes)",
                data.len(),
                buffer.raw(),
                storage.len()
            );
            return;
        }
        storage[offset..end].copy_from_slice(data);
    }

    fn bind_buffer_base(&self, binding: u32, buffer: GpuHandle) {
        let mut state = self.state.lock();
        state
            .calls
            .push(DeviceCall::BindBufferBase { binding, buffer });
        state.buffer_bindings.insert(binding, buffer);
    }

    fn delete_buffer(&self, buffer: GpuHandle) {
        let mut state = self.state.lock();
        if state.buffers.remove(&buffer).is_some() {
            state.calls.push(DeviceCall::Delete(ObjectKind::Buffer, buffer));
        }
    }

    fn create_vertex_array(&self, attributes: &[VertexAttribute]) -> GpuHandle {
        let mut state = self.state.lock();
        let handle = state.allocate(ObjectKind::VertexArray);
        if !handle.is_empty() {
            state.vertex_arrays.insert(handle, attributes.to_vec());
        }
        handle
    }

    fn delete_vertex_array(&self, vertex_array: GpuHandle) {
        let mut state = self.state.lock();
        if state.vertex_arrays.remove(&vertex_array).is_some() {
            state
                .calls
                .push(DeviceCall::Delete(ObjectKind::VertexArray, vertex_array));
        }
    }

    fn create_texture(&self) -> GpuHandle {
        let mut state = self.state.lock();
        let handle = state.allocate(ObjectKind::Texture);
        if !handle.is_empty() {
            state.textures.insert(
                handle,
                TextureState {
                    width: 0,
                    height: 0,
                    format: None,
                    filter: FilterMode::Linear,
                    wrap: WrapMode::Repeat,
                },
            );
        }
        handle
    }

    fn texture_image(&self, texture: GpuHandle, image: &TextureImage<'_>) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::TextureImage(texture));
        if let Some(entry) = state.textures.get_mut(&texture) {
            entry.width = image.width;
            entry.height = image.height;
            entry.format = Some(image.format);
        }
    }

    fn texture_filter(&self, texture: GpuHandle, filter: FilterMode) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::TextureParameter(texture));
        if let Some(entry) = state.textures.get_mut(&texture) {
            entry.filter = filter;
        }
    }

    fn texture_wrap(&self, texture: GpuHandle, wrap: WrapMode) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::TextureParameter(texture));
        if let Some(entry) = state.textures.get_mut(&texture) {
            entry.wrap = wrap;
        }
    }

    fn bind_texture(&self, unit: u32, texture: GpuHandle) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::BindTexture { unit, texture });
        state.texture_units.insert(unit, texture);
    }

    fn delete_texture(&self, texture: GpuHandle) {
        let mut state = self.state.lock();
        if state.textures.remove(&texture).is_some() {
            state
                .calls
                .push(DeviceCall::Delete(ObjectKind::Texture, texture));
        }
    }

    fn create_framebuffer(&self) -> GpuHandle {
        let mut state = self.state.lock();
        let handle = state.allocate(ObjectKind::Framebuffer);
        if !handle.is_empty() {
            state
                .framebuffers
                .insert(handle, (GpuHandle::EMPTY, GpuHandle::EMPTY));
        }
        handle
    }

    fn framebuffer_attachments(
        &self,
        framebuffer: GpuHandle,
        color: GpuHandle,
        depth_stencil: GpuHandle,
    ) -> FramebufferStatus {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Attach(framebuffer));
        if state.forced_incomplete {
            return FramebufferStatus::Incomplete("forced incomplete");
        }
        if !state.framebuffers.contains_key(&framebuffer) {
            return FramebufferStatus::Incomplete("unknown framebuffer");
        }
        let (Some(color_state), Some(depth_state)) =
            (state.textures.get(&color), state.textures.get(&depth_stencil))
        else {
            return FramebufferStatus::Incomplete("missing attachment");
        };
        if !matches!(color_state.format, Some(format) if format.is_color()) {
            return FramebufferStatus::Incomplete("color attachment is not color renderable");
        }
        if depth_state.format != Some(TextureFormat::Depth24Stencil8) {
            return FramebufferStatus::Incomplete("depth attachment has no depth/stencil storage");
        }
        if (color_state.width, color_state.height) != (depth_state.width, depth_state.height) {
            return FramebufferStatus::Incomplete("attachment sizes differ");
        }
        state
            .framebuffers
            .insert(framebuffer, (color, depth_stencil));
        FramebufferStatus::Complete
    }

    fn bind_framebuffer(&self, framebuffer: GpuHandle) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::BindFramebuffer(framebuffer));
        state.framebuffer = framebuffer;
    }

    fn clear(&self, mask: ClearMask) {
        self.state.lock().calls.push(DeviceCall::Clear(mask));
    }

    fn delete_framebuffer(&self, framebuffer: GpuHandle) {
        let mut state = self.state.lock();
        if state.framebuffers.remove(&framebuffer).is_some() {
            state
                .calls
                .push(DeviceCall::Delete(ObjectKind::Framebuffer, framebuffer));
        }
    }

    fn create_program(&self, source: &'static ProgramSource) -> GpuHandle {
        let mut state = self.state.lock();
        let handle = state.allocate(ObjectKind::Program);
        if !handle.is_empty() {
            state.programs.insert(handle, source);
        }
        handle
    }

    fn attribute_location(&self, program: GpuHandle, name: &str) -> Option<u32> {
        let state = self.state.lock();
        state
            .programs
            .get(&program)?
            .attribute(name)
            .map(|attr| attr.location)
    }

    fn uniform_location(&self, program: GpuHandle, name: &str) -> Option<UniformSlot> {
        self.state.lock().programs.get(&program)?.uniform_slot(name)
    }

    fn uniform_block_index(&self, program: GpuHandle, name: &str) -> Option<u32> {
        self.state.lock().programs.get(&program)?.block_index(name)
    }

    fn uniform_block_binding(&self, program: GpuHandle, block: u32, binding: u32) {
        let mut state = self.state.lock();
        state
            .calls
            .push(DeviceCall::BlockBinding { block, binding });
        state.block_bindings.insert((program, block), binding);
    }

    fn use_program(&self, program: GpuHandle) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::UseProgram(program));
        state.program = program;
    }

    fn set_uniform(&self, slot: UniformSlot, value: UniformValue) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::SetUniform(slot));
        if state.program.is_empty() {
            warn!("uniform {} written with no active program", slot.0);
            return;
        }
        let program = state.program;
        state.uniforms.insert((program, slot), value);
    }

    fn delete_program(&self, program: GpuHandle) {
        let mut state = self.state.lock();
        if state.programs.remove(&program).is_some() {
            state
                .calls
                .push(DeviceCall::Delete(ObjectKind::Program, program));
        }
    }

    fn draw_arrays(&self, vertex_array: GpuHandle, first: u32, count: u32) {
        let mut state = self.state.lock();
        state.calls.push(DeviceCall::Draw {
            vertex_array,
            count,
        });
        let record = DrawRecord {
            framebuffer: state.framebuffer,
            program: state.program,
            vertex_array,
            first,
            count,
            texture: state.texture_units.get(&0).copied().unwrap_or_default(),
            texture_type: state.int_uniform("texture_type"),
            flip_texel_v: state.int_uniform("flip_texel_v").unwrap_or(0) != 0,
        };
        state.draws.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_kind_returns_empty_handle() {
        let device = HeadlessDevice::new();
        device.fail_creation_of(ObjectKind::Texture);
        assert!(device.create_texture().is_empty());
        assert!(!device.create_buffer(BufferUsage::Uniform, 16).is_empty());
    }

    #[test]
    fn buffer_writes_are_readable() {
        let device = HeadlessDevice::new();
        let buffer = device.create_buffer(BufferUsage::Uniform, 8);
        device.write_buffer(buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(
            device.buffer_contents(buffer),
            Some(vec![0, 0, 0, 0, 1, 2, 3, 4])
        );
    }

    #[test]
    fn overflowing_write_is_ignored() {
        let device = HeadlessDevice::new();
        let buffer = device.create_buffer(BufferUsage::Uniform, 2);
        device.write_buffer(buffer, 0, &[9, 9, 9]);
        assert_eq!(device.buffer_contents(buffer), Some(vec![0, 0]));
    }

    #[test]
    fn deleting_twice_logs_once() {
        let device = HeadlessDevice::new();
        let buffer = device.create_buffer(BufferUsage::Vertex, 4);
        device.delete_buffer(buffer);
        device.delete_buffer(buffer);
        let deletes = device
            .calls()
            .into_iter()
            .filter(|call| matches!(call, DeviceCall::Delete(..)))
            .count();
        assert_eq!(deletes, 1);
        assert_eq!(device.live_objects(), 0);
    }
}
