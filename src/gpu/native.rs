//! wgpu backend.
//!
//! GL-style immediate calls are recorded into a per-frame command list:
//! each framebuffer switch opens a new pass, each draw snapshots the bound
//! program's constant block into a dynamic-offset uniform buffer. `present`
//! replays the list into render passes in recording order.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use parking_lot::Mutex;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::gpu::{
    BufferUsage, ClearMask, FilterMode, FramebufferStatus, GpuHandle, GraphicsDevice,
    ProgramSource, TextureFormat, TextureImage, UniformSlot, UniformValue, VertexAttribute,
    WrapMode,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.5,
    g: 0.5,
    b: 0.5,
    a: 1.0,
};
const FALLBACK_BLOCK_SIZE: u64 = 512;

/// Graphics device drawing into a window surface through wgpu.
pub struct WgpuDevice {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: Mutex<NativeState>,
}

struct NativeState {
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    next_handle: u32,
    buffers: HashMap<GpuHandle, wgpu::Buffer>,
    vertex_arrays: HashMap<GpuHandle, Vec<VertexAttribute>>,
    textures: HashMap<GpuHandle, NativeTexture>,
    framebuffers: HashMap<GpuHandle, (GpuHandle, GpuHandle)>,
    programs: HashMap<GpuHandle, NativeProgram>,
    pipelines: HashMap<(GpuHandle, wgpu::TextureFormat), wgpu::RenderPipeline>,
    buffer_bindings: HashMap<u32, GpuHandle>,
    texture_units: HashMap<u32, GpuHandle>,
    framebuffer: GpuHandle,
    program: GpuHandle,
    frame: FrameRecorder,
    fallback: FallbackTexture,
    fallback_block: wgpu::Buffer,
}

impl NativeState {
    fn allocate(&mut self) -> GpuHandle {
        self.next_handle += 1;
        GpuHandle::new(self.next_handle)
    }

    fn target_format(&self, target: GpuHandle) -> wgpu::TextureFormat {
        if target.is_empty() {
            self.config.format
        } else {
            OFFSCREEN_FORMAT
        }
    }
}

struct NativeTexture {
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    format: Option<TextureFormat>,
    filter: FilterMode,
    wrap: WrapMode,
}

impl NativeTexture {
    fn new(device: &wgpu::Device) -> Self {
        Self {
            texture: None,
            view: None,
            sampler: create_sampler(device, FilterMode::Linear, WrapMode::Repeat),
            width: 0,
            height: 0,
            format: None,
            filter: FilterMode::Linear,
            wrap: WrapMode::Repeat,
        }
    }
}

struct NativeProgram {
    source: &'static ProgramSource,
    module: wgpu::ShaderModule,
    constants_layout: wgpu::BindGroupLayout,
    blocks_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    block_bindings: Vec<u32>,
    constants: Vec<u8>,
}

#[derive(Default)]
struct FrameRecorder {
    passes: Vec<RecordedPass>,
    constants: Vec<u8>,
}

struct RecordedPass {
    target: GpuHandle,
    clear: ClearMask,
    draws: Vec<RecordedDraw>,
}

struct RecordedDraw {
    program: GpuHandle,
    vertex_array: GpuHandle,
    first: u32,
    count: u32,
    constants_offset: u32,
    texture: GpuHandle,
    blocks: Vec<GpuHandle>,
}

impl FrameRecorder {
    fn pass_for(&mut self, target: GpuHandle) -> &mut RecordedPass {
        let reuse = matches!(self.passes.last(), Some(pass) if pass.target == target);
        if !reuse {
            self.passes.push(RecordedPass {
                target,
                clear: ClearMask::default(),
                draws: Vec::new(),
            });
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    fn clear(&mut self, target: GpuHandle, mask: ClearMask) {
        let needs_new = matches!(self.passes.last(), Some(pass) if pass.target == target && !pass.draws.is_empty());
        if needs_new {
            self.passes.push(RecordedPass {
                target,
                clear: mask,
                draws: Vec::new(),
            });
            return;
        }
        let pass = self.pass_for(target);
        pass.clear.color |= mask.color;
        pass.clear.depth |= mask.depth;
    }
}

impl WgpuDevice {
    /// Initializes the device for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("mirror-room-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let fallback = create_fallback_texture(&device, &queue);
        let fallback_block = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fallback-block"),
            size: FALLBACK_BLOCK_SIZE,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });

        let state = NativeState {
            config,
            depth,
            next_handle: 0,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            buffer_bindings: HashMap::new(),
            texture_units: HashMap::new(),
            framebuffer: GpuHandle::EMPTY,
            program: GpuHandle::EMPTY,
            frame: FrameRecorder::default(),
            fallback,
            fallback_block,
        };

        Ok(Self {
            window,
            surface,
            device,
            queue,
            state: Mutex::new(state),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigures the surface and default depth buffer.
    pub fn resize(&self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.config.width = new_size.width;
        state.config.height = new_size.height;
        self.surface.configure(&self.device, &state.config);
        state.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Replays the recorded frame into the surface and presents it.
    ///
    /// The recorded commands are consumed even when the surface cannot be
    /// acquired, so a lost frame never leaks into the next one.
    pub fn present(&self) -> Result<(), wgpu::SurfaceError> {
        let mut guard = self.state.lock();
        let frame = std::mem::take(&mut guard.frame);
        let output = self.surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let state = &mut *guard;
        for pass in &frame.passes {
            let format = state.target_format(pass.target);
            for draw in &pass.draws {
                if !state.pipelines.contains_key(&(draw.program, format)) {
                    if let Some(program) = state.programs.get(&draw.program) {
                        let pipeline = create_pipeline(&self.device, program, format);
                        state.pipelines.insert((draw.program, format), pipeline);
                    }
                }
            }
        }
        let state = &*guard;

        let mut constants = frame.constants;
        if constants.is_empty() {
            constants.resize(256, 0);
        }
        let constants_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("frame-constants"),
                contents: &constants,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut bind_groups: Vec<wgpu::BindGroup> = Vec::new();
        let mut constant_groups: HashMap<GpuHandle, usize> = HashMap::new();
        let mut block_groups: HashMap<(GpuHandle, Vec<GpuHandle>), usize> = HashMap::new();
        let mut texture_groups: HashMap<(GpuHandle, GpuHandle), usize> = HashMap::new();
        let mut draw_groups: Vec<Vec<Option<[usize; 3]>>> = Vec::new();

        for pass in &frame.passes {
            let mut groups = Vec::with_capacity(pass.draws.len());
            for draw in &pass.draws {
                let Some(program) = state.programs.get(&draw.program) else {
                    groups.push(None);
                    continue;
                };
                let constants_index = *constant_groups.entry(draw.program).or_insert_with(|| {
                    bind_groups.push(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("constants-bind-group"),
                        layout: &program.constants_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                buffer: &constants_buffer,
                                offset: 0,
                                size: NonZeroU64::new(program.source.constants_size as u64),
                            }),
                        }],
                    }));
                    bind_groups.len() - 1
                });
                let blocks_index = *block_groups
                    .entry((draw.program, draw.blocks.clone()))
                    .or_insert_with(|| {
                        let entries: Vec<wgpu::BindGroupEntry> = draw
                            .blocks
                            .iter()
                            .enumerate()
                            .map(|(binding, handle)| wgpu::BindGroupEntry {
                                binding: binding as u32,
                                resource: state
                                    .buffers
                                    .get(handle)
                                    .unwrap_or(&state.fallback_block)
                                    .as_entire_binding(),
                            })
                            .collect();
                        bind_groups.push(self.device.create_bind_group(
                            &wgpu::BindGroupDescriptor {
                                label: Some("blocks-bind-group"),
                                layout: &program.blocks_layout,
                                entries: &entries,
                            },
                        ));
                        bind_groups.len() - 1
                    });
                let texture_index = *texture_groups
                    .entry((draw.program, draw.texture))
                    .or_insert_with(|| {
                        let (view, sampler) = state
                            .textures
                            .get(&draw.texture)
                            .filter(|texture| {
                                matches!(texture.format, Some(format) if format.is_color())
                            })
                            .and_then(|texture| Some((texture.view.as_ref()?, &texture.sampler)))
                            .unwrap_or((&state.fallback.view, &state.fallback.sampler));
                        bind_groups.push(self.device.create_bind_group(
                            &wgpu::BindGroupDescriptor {
                                label: Some("texture-bind-group"),
                                layout: &program.texture_layout,
                                entries: &[
                                    wgpu::BindGroupEntry {
                                        binding: 0,
                                        resource: wgpu::BindingResource::TextureView(view),
                                    },
                                    wgpu::BindGroupEntry {
                                        binding: 1,
                                        resource: wgpu::BindingResource::Sampler(sampler),
                                    },
                                ],
                            },
                        ));
                        bind_groups.len() - 1
                    });
                groups.push(Some([constants_index, blocks_index, texture_index]));
            }
            draw_groups.push(groups);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        for (pass, groups) in frame.passes.iter().zip(draw_groups.iter()) {
            let (color_view, depth_view) = if pass.target.is_empty() {
                (&surface_view, &state.depth.view)
            } else {
                let attachments = state
                    .framebuffers
                    .get(&pass.target)
                    .and_then(|(color, depth)| {
                        let color = state.textures.get(color)?.view.as_ref()?;
                        let depth = state.textures.get(depth)?.view.as_ref()?;
                        Some((color, depth))
                    });
                let Some(attachments) = attachments else {
                    warn!("skipping pass into incomplete framebuffer {}", pass.target.raw());
                    continue;
                };
                attachments
            };
            let format = state.target_format(pass.target);

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if pass.clear.color {
                            wgpu::LoadOp::Clear(CLEAR_COLOR)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if pass.clear.depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: if pass.clear.depth {
                            wgpu::LoadOp::Clear(0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (draw, group) in pass.draws.iter().zip(groups.iter()) {
                let (Some([constants_index, blocks_index, texture_index]), Some(pipeline)) =
                    (group, state.pipelines.get(&(draw.program, format)))
                else {
                    continue;
                };
                let (Some(program), Some(attributes)) = (
                    state.programs.get(&draw.program),
                    state.vertex_arrays.get(&draw.vertex_array),
                ) else {
                    continue;
                };
                let mut complete = true;
                render_pass.set_pipeline(pipeline);
                for (slot, decl) in program.source.attributes.iter().enumerate() {
                    let buffer = attributes
                        .iter()
                        .find(|attr| attr.location == decl.location)
                        .and_then(|attr| state.buffers.get(&attr.buffer));
                    match buffer {
                        Some(buffer) => render_pass.set_vertex_buffer(slot as u32, buffer.slice(..)),
                        None => complete = false,
                    }
                }
                if !complete {
                    warn!(
                        "vertex array {} lacks attributes required by {}",
                        draw.vertex_array.raw(),
                        program.source.label
                    );
                    continue;
                }
                render_pass.set_bind_group(0, &bind_groups[*constants_index], &[draw.constants_offset]);
                render_pass.set_bind_group(1, &bind_groups[*blocks_index], &[]);
                render_pass.set_bind_group(2, &bind_groups[*texture_index], &[]);
                render_pass.draw(draw.first..draw.first + draw.count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn constants_stride(&self, size: u32) -> usize {
        let align = self.device.limits().min_uniform_buffer_offset_alignment.max(1);
        (size.div_ceil(align) * align) as usize
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&self, usage: BufferUsage, size: usize) -> GpuHandle {
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;
        // wgpu requires copy sizes aligned to 4 bytes.
        let size = (size.max(4) as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("device-buffer"),
            size,
            usage,
            mapped_at_creation: false,
        });
        let mut state = self.state.lock();
        let handle = state.allocate();
        state.buffers.insert(handle, buffer);
        handle
    }

    fn write_buffer(&self, buffer: GpuHandle, offset: usize, data: &[u8]) {
        let state = self.state.lock();
        let Some(target) = state.buffers.get(&buffer) else {
            warn!("write to unknown buffer {}", buffer.raw());
            return;
        };
        if data.is_empty() {
            return;
        }
        if data.len() % 4 == 0 {
            self.queue.write_buffer(target, offset as u64, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().next_multiple_of(4), 0);
            self.queue.write_buffer(target, offset as u64, &padded);
        }
    }

    fn bind_buffer_base(&self, binding: u32, buffer: GpuHandle) {
        self.state.lock().buffer_bindings.insert(binding, buffer);
    }

    fn delete_buffer(&self, buffer: GpuHandle) {
        if let Some(buffer) = self.state.lock().buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn create_vertex_array(&self, attributes: &[VertexAttribute]) -> GpuHandle {
        let mut state = self.state.lock();
        let handle = state.allocate();
        state.vertex_arrays.insert(handle, attributes.to_vec());
        handle
    }

    fn delete_vertex_array(&self, vertex_array: GpuHandle) {
        self.state.lock().vertex_arrays.remove(&vertex_array);
    }

    fn create_texture(&self) -> GpuHandle {
        let texture = NativeTexture::new(&self.device);
        let mut state = self.state.lock();
        let handle = state.allocate();
        state.textures.insert(handle, texture);
        handle
    }

    fn texture_image(&self, texture: GpuHandle, image: &TextureImage<'_>) {
        let mut state = self.state.lock();
        let Some(entry) = state.textures.get_mut(&texture) else {
            warn!("image upload to unknown texture {}", texture.raw());
            return;
        };
        let (format, usage) = match image.format {
            TextureFormat::Depth24Stencil8 => {
                (DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT)
            }
            TextureFormat::Rgb8 | TextureFormat::Rgba8 => (
                OFFSCREEN_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::RENDER_ATTACHMENT,
            ),
        };
        let size = wgpu::Extent3d {
            width: image.width.max(1),
            height: image.height.max(1),
            depth_or_array_layers: 1,
        };
        let created = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("device-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        if let Some(pixels) = image.pixels {
            let rgba = match image.format {
                TextureFormat::Rgb8 => pixels
                    .chunks_exact(3)
                    .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                    .collect(),
                _ => pixels.to_vec(),
            };
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &created,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &rgba,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * size.width),
                    rows_per_image: Some(size.height),
                },
                size,
            );
        }
        entry.view = Some(created.create_view(&wgpu::TextureViewDescriptor::default()));
        if let Some(previous) = entry.texture.replace(created) {
            previous.destroy();
        }
        entry.width = image.width;
        entry.height = image.height;
        entry.format = Some(image.format);
    }

    fn texture_filter(&self, texture: GpuHandle, filter: FilterMode) {
        let mut state = self.state.lock();
        if let Some(entry) = state.textures.get_mut(&texture) {
            entry.filter = filter;
            entry.sampler = create_sampler(&self.device, entry.filter, entry.wrap);
        }
    }

    fn texture_wrap(&self, texture: GpuHandle, wrap: WrapMode) {
        let mut state = self.state.lock();
        if let Some(entry) = state.textures.get_mut(&texture) {
            entry.wrap = wrap;
            entry.sampler = create_sampler(&self.device, entry.filter, entry.wrap);
        }
    }

    fn bind_texture(&self, unit: u32, texture: GpuHandle) {
        self.state.lock().texture_units.insert(unit, texture);
    }

    fn delete_texture(&self, texture: GpuHandle) {
        if let Some(entry) = self.state.lock().textures.remove(&texture) {
            if let Some(texture) = entry.texture {
                texture.destroy();
            }
        }
    }

    fn create_framebuffer(&self) -> GpuHandle {
        let mut state = self.state.lock();
        let handle = state.allocate();
        state
            .framebuffers
            .insert(handle, (GpuHandle::EMPTY, GpuHandle::EMPTY));
        handle
    }

    fn framebuffer_attachments(
        &self,
        framebuffer: GpuHandle,
        color: GpuHandle,
        depth_stencil: GpuHandle,
    ) -> FramebufferStatus {
        let mut state = self.state.lock();
        if !state.framebuffers.contains_key(&framebuffer) {
            return FramebufferStatus::Incomplete("unknown framebuffer");
        }
        let (Some(color_entry), Some(depth_entry)) =
            (state.textures.get(&color), state.textures.get(&depth_stencil))
        else {
            return FramebufferStatus::Incomplete("missing attachment");
        };
        if !matches!(color_entry.format, Some(format) if format.is_color()) {
            return FramebufferStatus::Incomplete("color attachment is not color renderable");
        }
        if depth_entry.format != Some(TextureFormat::Depth24Stencil8) {
            return FramebufferStatus::Incomplete("depth attachment has no depth/stencil storage");
        }
        if (color_entry.width, color_entry.height) != (depth_entry.width, depth_entry.height) {
            return FramebufferStatus::Incomplete("attachment sizes differ");
        }
        state
            .framebuffers
            .insert(framebuffer, (color, depth_stencil));
        FramebufferStatus::Complete
    }

    fn bind_framebuffer(&self, framebuffer: GpuHandle) {
        self.state.lock().framebuffer = framebuffer;
    }

    fn clear(&self, mask: ClearMask) {
        let mut state = self.state.lock();
        let target = state.framebuffer;
        state.frame.clear(target, mask);
    }

    fn delete_framebuffer(&self, framebuffer: GpuHandle) {
        self.state.lock().framebuffers.remove(&framebuffer);
    }

    fn create_program(&self, source: &'static ProgramSource) -> GpuHandle {
        let program = create_program(&self.device, source);
        let mut state = self.state.lock();
        let handle = state.allocate();
        debug!("compiled {} as program {}", source.label, handle.raw());
        state.programs.insert(handle, program);
        handle
    }

    fn attribute_location(&self, program: GpuHandle, name: &str) -> Option<u32> {
        let state = self.state.lock();
        state
            .programs
            .get(&program)?
            .source
            .attribute(name)
            .map(|attr| attr.location)
    }

    fn uniform_location(&self, program: GpuHandle, name: &str) -> Option<UniformSlot> {
        self.state
            .lock()
            .programs
            .get(&program)?
            .source
            .uniform_slot(name)
    }

    fn uniform_block_index(&self, program: GpuHandle, name: &str) -> Option<u32> {
        self.state
            .lock()
            .programs
            .get(&program)?
            .source
            .block_index(name)
    }

    fn uniform_block_binding(&self, program: GpuHandle, block: u32, binding: u32) {
        let mut state = self.state.lock();
        if let Some(slot) = state
            .programs
            .get_mut(&program)
            .and_then(|program| program.block_bindings.get_mut(block as usize))
        {
            *slot = binding;
        }
    }

    fn use_program(&self, program: GpuHandle) {
        self.state.lock().program = program;
    }

    fn set_uniform(&self, slot: UniformSlot, value: UniformValue) {
        let mut state = self.state.lock();
        let current = state.program;
        let Some(program) = state.programs.get_mut(&current) else {
            warn!("uniform {} written with no active program", slot.0);
            return;
        };
        let Some(decl) = program.source.uniform(slot) else {
            return;
        };
        let bytes = value.to_std140();
        let start = decl.offset as usize;
        let end = (start + bytes.len()).min(program.constants.len());
        program.constants[start..end].copy_from_slice(&bytes[..end - start]);
    }

    fn delete_program(&self, program: GpuHandle) {
        let mut state = self.state.lock();
        state.programs.remove(&program);
        state.pipelines.retain(|(owner, _), _| *owner != program);
    }

    fn draw_arrays(&self, vertex_array: GpuHandle, first: u32, count: u32) {
        let stride = {
            let state = self.state.lock();
            match state.programs.get(&state.program) {
                Some(program) => self.constants_stride(program.source.constants_size),
                None => {
                    warn!("draw issued with no active program");
                    return;
                }
            }
        };
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(program) = state.programs.get(&state.program) else {
            return;
        };
        let offset = state.frame.constants.len();
        state.frame.constants.extend_from_slice(&program.constants);
        state.frame.constants.resize(offset + stride, 0);
        let blocks = program
            .block_bindings
            .iter()
            .map(|binding| {
                state
                    .buffer_bindings
                    .get(binding)
                    .copied()
                    .unwrap_or_default()
            })
            .collect();
        let draw = RecordedDraw {
            program: state.program,
            vertex_array,
            first,
            count,
            constants_offset: offset as u32,
            texture: state.texture_units.get(&0).copied().unwrap_or_default(),
            blocks,
        };
        let target = state.framebuffer;
        state.frame.pass_for(target).draws.push(draw);
    }
}

fn create_program(device: &wgpu::Device, source: &'static ProgramSource) -> NativeProgram {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(source.label),
        source: wgpu::ShaderSource::Wgsl(source.wgsl.into()),
    });

    let constants_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("constants-layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(source.constants_size as u64),
            },
            count: None,
        }],
    });

    let block_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..source.blocks.len())
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding: binding as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();
    let blocks_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("blocks-layout"),
        entries: &block_entries,
    });

    let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("texture-layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("program-pipeline-layout"),
        bind_group_layouts: &[&constants_layout, &blocks_layout, &texture_layout],
        push_constant_ranges: &[],
    });

    NativeProgram {
        source,
        module,
        constants_layout,
        blocks_layout,
        texture_layout,
        pipeline_layout,
        block_bindings: (0..source.blocks.len() as u32).collect(),
        constants: vec![0; source.constants_size as usize],
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    program: &NativeProgram,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = program
        .source
        .attributes
        .iter()
        .map(|decl| {
            [wgpu::VertexAttribute {
                format: match decl.components {
                    2 => wgpu::VertexFormat::Float32x2,
                    4 => wgpu::VertexFormat::Float32x4,
                    _ => wgpu::VertexFormat::Float32x3,
                },
                offset: 0,
                shader_location: decl.location,
            }]
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout> = program
        .source
        .attributes
        .iter()
        .zip(attributes.iter())
        .map(|(decl, attribute)| wgpu::VertexBufferLayout {
            array_stride: (decl.components as usize * std::mem::size_of::<f32>()) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attribute,
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.source.label),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: "vs_main",
            buffers: &buffers,
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    })
}

fn create_sampler(device: &wgpu::Device, filter: FilterMode, wrap: WrapMode) -> wgpu::Sampler {
    let filter = match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    };
    let address_mode = match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("texture-sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        ..Default::default()
    })
}

/// 1x1 white texture sampled when no color texture is bound.
struct FallbackTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

fn create_fallback_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> FallbackTexture {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("fallback-texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    FallbackTexture {
        view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        sampler: create_sampler(device, FilterMode::Linear, WrapMode::Repeat),
        _texture: texture,
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
