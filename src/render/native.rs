use std::sync::Arc;

use log::{info, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::error::{FrameError, SetupError};
use crate::frame::{FramePlan, RenderBackend};
use crate::geometry::{padded_size, MeshData};
use crate::transform::DrawUniforms;

use super::shader::{ShaderCode, ShaderSet, ShaderStage};

/// wgpu renderer drawing the shared cube once per drawable.
pub struct GpuRenderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    pipeline: wgpu::RenderPipeline,
    geometry: GeometryBuffers,
    drawables: Vec<DrawableResources>,
}

impl GpuRenderer {
    /// Creates the device, pipeline and per-drawable uniform resources.
    ///
    /// Any failure here is fatal.
    pub async fn new(
        window: Arc<Window>,
        shaders: &ShaderSet,
        drawable_count: usize,
    ) -> Result<Self, SetupError> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(SetupError::ZeroArea);
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
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
            .await?;
        info!("using adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("viewer-device"),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(SetupError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let vertex_module = create_module(&device, "vertex", &shaders.vertex);
        let fragment_module = create_module(&device, "fragment", &shaders.fragment);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(DrawUniforms::SIZE),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewer-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        // Positions and colors live in separate tightly packed buffers.
        let float3_stride = (3 * std::mem::size_of::<f32>()) as u64;
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("viewer-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(&shaders.vertex.entry_point),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: float3_stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: float3_stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 1,
                        }],
                    },
                ],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Cw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(&shaders.fragment.entry_point),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let geometry = GeometryBuffers::upload(&device, &MeshData::cube(), "cube");
        let drawables = (0..drawable_count)
            .map(|index| DrawableResources::create(&device, &uniform_layout, index))
            .collect();

        info!(
            "renderer ready: {}x{} {:?}, {drawable_count} drawable(s)",
            config.width, config.height, surface_format
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            pipeline,
            geometry,
            drawables,
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain and depth buffer. Zero sizes are ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    fn acquire_frame(&mut self) -> Result<wgpu::SurfaceTexture, FrameError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.resize(size);
                Err(FrameError::TargetUnavailable(
                    "surface lost or outdated; reconfigured".to_string(),
                ))
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(FrameError::OutOfMemory),
            Err(err) => Err(FrameError::TargetUnavailable(err.to_string())),
        }
    }
}

impl RenderBackend for GpuRenderer {
    fn target_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn write_uniforms(
        &mut self,
        drawable: usize,
        uniforms: &DrawUniforms,
    ) -> Result<(), FrameError> {
        let resources = self
            .drawables
            .get(drawable)
            .ok_or(FrameError::UnknownDrawable { index: drawable })?;
        self.queue
            .write_buffer(&resources.uniform_buffer, 0, uniforms.as_bytes());
        Ok(())
    }

    fn submit(&mut self, plan: &FramePlan) -> Result<(), FrameError> {
        // Check every draw up front so a bad draw aborts the frame before
        // anything is encoded.
        if let Some(draw) = plan
            .draws
            .iter()
            .find(|draw| draw.drawable >= self.drawables.len())
        {
            return Err(FrameError::UnknownDrawable {
                index: draw.drawable,
            });
        }

        let output = self.acquire_frame()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        let [r, g, b, a] = plan.clear_color;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(plan.clear_depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        for draw in &plan.draws {
            let rect = draw.viewport;
            pass.set_viewport(
                rect.x as f32,
                rect.y as f32,
                rect.width as f32,
                rect.height as f32,
                0.0,
                1.0,
            );
            pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
            pass.set_bind_group(0, &self.drawables[draw.drawable].bind_group, &[]);
            pass.set_vertex_buffer(0, self.geometry.positions.slice(..));
            pass.set_vertex_buffer(1, self.geometry.colors.slice(..));
            pass.set_index_buffer(self.geometry.indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..draw.index_count.min(self.geometry.index_count), 0, 0..1);
        }

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

fn create_module(device: &wgpu::Device, stage: &str, shader: &ShaderStage) -> wgpu::ShaderModule {
    let source = match &shader.code {
        ShaderCode::Wgsl(code) => wgpu::ShaderSource::Wgsl(code.clone()),
        ShaderCode::SpirV(bytes) => wgpu::util::make_spirv(bytes),
    };
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{stage}-shader")),
        source,
    })
}

/// Immutable vertex/index buffers shared by every drawable.
struct GeometryBuffers {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl GeometryBuffers {
    fn upload(device: &wgpu::Device, mesh: &MeshData<'_>, label: &str) -> Self {
        Self {
            positions: upload_buffer(
                device,
                &format!("{label}-positions"),
                bytemuck::cast_slice(mesh.positions),
                wgpu::BufferUsages::VERTEX,
            ),
            colors: upload_buffer(
                device,
                &format!("{label}-colors"),
                bytemuck::cast_slice(mesh.colors),
                wgpu::BufferUsages::VERTEX,
            ),
            indices: upload_buffer(
                device,
                &format!("{label}-indices"),
                bytemuck::cast_slice(mesh.indices),
                wgpu::BufferUsages::INDEX,
            ),
            index_count: mesh.index_count(),
        }
    }
}

/// Creates a buffer initialised with `contents`, padded to 4 bytes.
fn upload_buffer(
    device: &wgpu::Device,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    let mut padded = contents.to_vec();
    padded.resize(padded_size(contents.len()) as usize, 0);
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: &padded,
        usage,
    })
}

/// Uniform buffer and bind group owned by one drawable.
struct DrawableResources {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl DrawableResources {
    fn create(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, index: usize) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("drawable-{index}-uniforms")),
            size: DrawUniforms::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("drawable-{index}-bind-group")),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        Self {
            uniform_buffer,
            bind_group,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

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
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        if width == 0 || height == 0 {
            warn!("depth buffer requested with zero area; clamped to 1x1");
        }
        Self {
            _texture: texture,
            view,
        }
    }
}
