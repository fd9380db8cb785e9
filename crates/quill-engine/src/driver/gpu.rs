use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::ops::Range;
use std::rc::Rc;

use anyhow::{Context, Result};
use glam::{Mat4, Vec2};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, RgbaImage};
use wgpu::util::DeviceExt;

use crate::coords::ColorRgba;
use crate::shader::{BindingKind, ProgramLayout, ShaderStage};

use super::init::DriverInit;
use super::state::{DriverState, LiveCounts};
use super::types::{PixelFormat, TextureDescriptor};
use super::{
    DriverOps, GeometryHandle, ProgramHandle, ShaderHandle, TextureHandle, UniformLocation,
};

/// Format textures are stored in on the GPU. RGB uploads are expanded.
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Uniform buffer bindings are padded to this size.
const UNIFORM_ALIGN: u64 = 16;

/// A linked program: its pipeline and the layouts its bind groups are built from.
struct GpuProgram {
    pipeline: Rc<wgpu::RenderPipeline>,
    group_layouts: Vec<wgpu::BindGroupLayout>,
    layout: ProgramLayout,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct GpuGeometry {
    positions: wgpu::Buffer,
    uvs: wgpu::Buffer,
}

/// A validated draw waiting for `encode`.
struct PendingDraw {
    pipeline: Rc<wgpu::RenderPipeline>,
    bind_groups: Vec<wgpu::BindGroup>,
    geometry: Rc<GpuGeometry>,
    vertices: Range<u32>,
}

#[derive(Default)]
struct GpuObjects {
    shaders: HashMap<ShaderHandle, wgpu::ShaderModule>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    textures: HashMap<TextureHandle, Rc<GpuTexture>>,
    geometry: HashMap<GeometryHandle, Rc<GpuGeometry>>,
}

/// [`Driver`](super::Driver) implementation on wgpu.
///
/// Binding calls only update driver state; `draw_triangles` snapshots the
/// bound program, textures, geometry and uniform values into a pending draw.
/// Pending draws are recorded into a render pass by [`WgpuDriver::encode`].
pub struct WgpuDriver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,

    state: RefCell<DriverState>,
    objects: RefCell<GpuObjects>,
    pending: RefCell<Vec<PendingDraw>>,
}

impl WgpuDriver {
    /// Wraps an existing device. Programs render into `color_format` targets.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            queue,
            color_format,
            state: RefCell::new(DriverState::new()),
            objects: RefCell::new(GpuObjects::default()),
            pending: RefCell::new(Vec::new()),
        }
    }

    /// Acquires an adapter and device without a surface.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks.
    pub fn request(init: DriverInit) -> Result<Self> {
        pollster::block_on(Self::request_async(init))
    }

    async fn request_async(init: DriverInit) -> Result<Self> {
        // Use all backends to allow wgpu to select the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("quill device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        log::info!("wgpu driver on {:?}", adapter.get_info().name);

        Ok(Self::new(device, queue, init.color_format))
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    #[inline]
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    pub fn live_counts(&self) -> LiveCounts {
        self.state.borrow().live_counts()
    }

    /// Driver-level errors reported so far.
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors().to_vec()
    }

    /// Number of draws recorded since the last `encode`.
    pub fn pending_draws(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Records every pending draw into one render pass on `view`.
    ///
    /// `clear = None` keeps the existing contents. Returns the number of draws
    /// encoded.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        clear: Option<ColorRgba>,
    ) -> usize {
        let draws = std::mem::take(&mut *self.pending.borrow_mut());

        let load = match clear {
            Some(c) => wgpu::LoadOp::Clear(c.into()),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quill sprite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for draw in &draws {
            rpass.set_pipeline(&draw.pipeline);
            for (index, group) in draw.bind_groups.iter().enumerate() {
                rpass.set_bind_group(index as u32, group, &[]);
            }
            rpass.set_vertex_buffer(0, draw.geometry.positions.slice(..));
            rpass.set_vertex_buffer(1, draw.geometry.uvs.slice(..));
            rpass.draw(draw.vertices.clone(), 0..1);
        }

        draws.len()
    }

    /// Encodes pending draws into `view` and submits them.
    pub fn submit(&self, view: &wgpu::TextureView, clear: Option<ColorRgba>) -> usize {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quill frame encoder"),
            });
        let count = self.encode(&mut encoder, view, clear);
        self.queue.submit(std::iter::once(encoder.finish()));
        count
    }

    fn build_program(
        &self,
        layout: ProgramLayout,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> GpuProgram {
        let group_layouts: Vec<wgpu::BindGroupLayout> = (0..layout.group_count())
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = layout
                    .bindings
                    .iter()
                    .filter(|b| b.group == group)
                    .map(|b| wgpu::BindGroupLayoutEntry {
                        binding: b.binding,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: binding_type(&b.kind),
                        count: None,
                    })
                    .collect();
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("quill program bgl"),
                        entries: &entries,
                    })
            })
            .collect();

        let layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("quill program pipeline layout"),
                bind_group_layouts: &layout_refs,
                immediate_size: 0,
            });

        const POSITION_ATTRS: [wgpu::VertexAttribute; 1] =
            wgpu::vertex_attr_array![0 => Float32x2];
        const UV_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
        let stride = std::mem::size_of::<[f32; 2]>() as u64;

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("quill program pipeline"),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some(layout.vertex_entry.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: stride,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &POSITION_ATTRS,
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: stride,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &UV_ATTRS,
                        },
                    ],
                },

                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some(layout.fragment_entry.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        GpuProgram { pipeline: Rc::new(pipeline), group_layouts, layout }
    }

    fn build_bind_groups(
        &self,
        program: &GpuProgram,
        uniforms: &crate::shader::UniformState,
        textures: &[Option<TextureHandle>],
        objects: &GpuObjects,
    ) -> Option<Vec<wgpu::BindGroup>> {
        // Resources must outlive the entry borrows below.
        let mut buffers: HashMap<usize, wgpu::Buffer> = HashMap::new();
        let mut bound: HashMap<usize, Rc<GpuTexture>> = HashMap::new();

        for (index, decl) in program.layout.bindings.iter().enumerate() {
            match decl.kind {
                BindingKind::UniformBuffer { .. } => {
                    let block = uniforms.block(index);
                    let padded_len = (block.len() as u64).max(1).next_multiple_of(UNIFORM_ALIGN);
                    let mut contents = vec![0u8; padded_len as usize];
                    contents[..block.len()].copy_from_slice(block);
                    let buffer = self
                        .device
                        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some("quill uniform block"),
                            contents: &contents,
                            usage: wgpu::BufferUsages::UNIFORM,
                        });
                    buffers.insert(index, buffer);
                }
                BindingKind::Texture | BindingKind::Sampler => {
                    let handle = textures.get(index).copied().flatten()?;
                    bound.insert(index, objects.textures.get(&handle)?.clone());
                }
            }
        }

        let groups = program
            .group_layouts
            .iter()
            .enumerate()
            .map(|(group, bgl)| {
                let entries: Vec<wgpu::BindGroupEntry<'_>> = program
                    .layout
                    .bindings
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| b.group == group as u32)
                    .filter_map(|(index, b)| {
                        let resource = match b.kind {
                            BindingKind::UniformBuffer { .. } => {
                                buffers.get(&index)?.as_entire_binding()
                            }
                            BindingKind::Texture => {
                                wgpu::BindingResource::TextureView(&bound.get(&index)?.view)
                            }
                            BindingKind::Sampler => {
                                wgpu::BindingResource::Sampler(&bound.get(&index)?.sampler)
                            }
                        };
                        Some(wgpu::BindGroupEntry { binding: b.binding, resource })
                    })
                    .collect();

                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("quill draw bind group"),
                    layout: bgl,
                    entries: &entries,
                })
            })
            .collect();

        Some(groups)
    }
}

fn binding_type(kind: &BindingKind) -> wgpu::BindingType {
    match kind {
        BindingKind::UniformBuffer { size, .. } => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(u64::from(*size)),
        },
        BindingKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        BindingKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    }
}

/// Expands tightly packed pixels to RGBA8. Short data is zero-padded to the
/// descriptor's size.
fn to_rgba8(desc: &TextureDescriptor, pixels: &[u8]) -> RgbaImage {
    let (width, height) = (desc.width.max(1), desc.height.max(1));
    let mut raw = pixels.to_vec();
    raw.resize(width as usize * height as usize * desc.format.channels() as usize, 0);

    let image = match desc.format {
        PixelFormat::Rgba8 => RgbaImage::from_raw(width, height, raw).map(DynamicImage::ImageRgba8),
        PixelFormat::Rgb8 => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
    };
    image
        .map(|img| img.to_rgba8())
        .unwrap_or_else(|| RgbaImage::new(width, height))
}

/// `levels` images starting at `base`, each half the size of the previous one.
fn mip_chain(base: RgbaImage, levels: u32) -> Vec<RgbaImage> {
    let mut chain = Vec::with_capacity(levels as usize);
    let mut level = base;
    for _ in 1..levels {
        let (w, h) = ((level.width() / 2).max(1), (level.height() / 2).max(1));
        let next = imageops::resize(&level, w, h, FilterType::Triangle);
        chain.push(std::mem::replace(&mut level, next));
    }
    chain.push(level);
    chain
}

impl DriverOps for WgpuDriver {
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        let handle = self.state.borrow_mut().compile_shader(stage, source)?;

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "quill vertex stage",
                    ShaderStage::Fragment => "quill fragment stage",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        self.objects.borrow_mut().shaders.insert(handle, module);
        Ok(handle)
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        if self.state.borrow_mut().delete_shader(shader) {
            self.objects.borrow_mut().shaders.remove(&shader);
        }
    }

    fn create_program(&self) -> ProgramHandle {
        self.state.borrow_mut().create_program()
    }

    fn link_program(
        &self,
        program: ProgramHandle,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<(), String> {
        let linked = self.state.borrow_mut().link_program(program, vertex, fragment);
        let mut objects = self.objects.borrow_mut();
        objects.programs.remove(&program);

        let layout = linked?;
        let gpu = match (objects.shaders.get(&vertex), objects.shaders.get(&fragment)) {
            (Some(vs), Some(fs)) => self.build_program(layout, vs, fs),
            _ => return Err(format!("shader modules of {program:?} are missing")),
        };
        objects.programs.insert(program, gpu);
        Ok(())
    }

    fn delete_program(&self, program: ProgramHandle) {
        if self.state.borrow_mut().delete_program(program) {
            self.objects.borrow_mut().programs.remove(&program);
        }
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        self.state.borrow_mut().use_program(program);
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.state.borrow().uniform_location(program, name)
    }

    fn set_uniform_i32(&self, location: UniformLocation, value: i32) {
        self.state.borrow_mut().set_uniform_i32(location, value);
    }

    fn set_uniform_mat4(&self, location: UniformLocation, value: &Mat4) {
        self.state.borrow_mut().set_uniform_mat4(location, value);
    }

    fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> TextureHandle {
        let handle = self.state.borrow_mut().create_texture(desc, pixels);

        let width = desc.width.max(1);
        let height = desc.height.max(1);
        let mip_level_count = desc.mip_level_count();

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("quill texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let levels = mip_chain(to_rgba8(desc, pixels), mip_level_count);
        for (mip_level, level) in (0u32..).zip(&levels) {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                level.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level.width() * 4),
                    rows_per_image: Some(level.height()),
                },
                wgpu::Extent3d {
                    width: level.width(),
                    height: level.height(),
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quill texture sampler"),
            address_mode_u: desc.wrap.into(),
            address_mode_v: desc.wrap.into(),
            address_mode_w: desc.wrap.into(),
            mag_filter: desc.filter.into(),
            min_filter: desc.filter.into(),
            mipmap_filter: desc.filter.into(),
            ..Default::default()
        });

        self.objects.borrow_mut().textures.insert(
            handle,
            Rc::new(GpuTexture { _texture: texture, view, sampler }),
        );
        handle
    }

    fn delete_texture(&self, texture: TextureHandle) {
        if self.state.borrow_mut().delete_texture(texture) {
            self.objects.borrow_mut().textures.remove(&texture);
        }
    }

    fn active_texture_unit(&self, unit: u32) {
        self.state.borrow_mut().active_texture_unit(unit);
    }

    fn bind_texture(&self, texture: Option<TextureHandle>) {
        self.state.borrow_mut().bind_texture(texture);
    }

    fn create_geometry(&self, positions: &[Vec2], uvs: &[Vec2]) -> GeometryHandle {
        let handle = self.state.borrow_mut().create_geometry(positions.len(), uvs.len());

        let upload = |label: &str, data: &[Vec2]| {
            let raw: Vec<[f32; 2]> = data.iter().map(|v| v.to_array()).collect();
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&raw),
                usage: wgpu::BufferUsages::VERTEX,
            })
        };
        let geometry = GpuGeometry {
            positions: upload("quill positions vbo", positions),
            uvs: upload("quill uvs vbo", uvs),
        };

        self.objects.borrow_mut().geometry.insert(handle, Rc::new(geometry));
        handle
    }

    fn delete_geometry(&self, geometry: GeometryHandle) {
        if self.state.borrow_mut().delete_geometry(geometry) {
            self.objects.borrow_mut().geometry.remove(&geometry);
        }
    }

    fn bind_geometry(&self, geometry: Option<GeometryHandle>) {
        self.state.borrow_mut().bind_geometry(geometry);
    }

    fn draw_triangles(&self, first: u32, count: u32) {
        let Some(call) = self.state.borrow_mut().prepare_draw(first, count) else { return };

        let objects = self.objects.borrow();
        let (Some(program), Some(geometry)) =
            (objects.programs.get(&call.program), objects.geometry.get(&call.geometry))
        else {
            return;
        };

        let Some(bind_groups) =
            self.build_bind_groups(program, &call.uniforms, &call.textures, &objects)
        else {
            log::error!("driver: texture objects for {:?} are missing", call.program);
            return;
        };

        self.pending.borrow_mut().push(PendingDraw {
            pipeline: program.pipeline.clone(),
            bind_groups,
            geometry: geometry.clone(),
            vertices: call.first..call.first + call.count,
        });
    }
}
