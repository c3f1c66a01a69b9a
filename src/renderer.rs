use std::rc::Rc;

use web_sys::HtmlCanvasElement;
use wgpu::util::DeviceExt;

use crate::config::SceneConfig;
use crate::context::AppContext;
use crate::error::{PackError, Result};
use crate::geometry::BaseGeometry;
use crate::helpers::{axes_helper, grid_helper};
use crate::types::{instance_chunks, InstanceData, LineVertex, Uniforms, Vertex};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuMesh {
    source: Rc<BaseGeometry>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

struct GpuLines {
    buffer: wgpu::Buffer,
    num_vertices: u32,
}

pub struct PackRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    mesh_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    uniforms: Uniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    mesh: Option<GpuMesh>,
    // one buffer per chunk when a pack exceeds max_buffer_size
    instance_buffers: Vec<(wgpu::Buffer, u32)>,
    uploaded_generation: Option<u64>,
    grid_lines: GpuLines,
    axes_lines: GpuLines,
}

fn render_err(what: &str, e: impl std::fmt::Debug) -> PackError {
    PackError::Render(format!("{what}: {e:?}"))
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_lines(device: &wgpu::Device, label: &str, vertices: &[LineVertex]) -> GpuLines {
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    GpuLines {
        buffer,
        num_vertices: vertices.len() as u32,
    }
}

fn gl_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::GL,
        flags: wgpu::InstanceFlags::default(),
        backend_options: wgpu::BackendOptions {
            gl: wgpu::GlBackendOptions {
                gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
                fence_behavior: wgpu::GlFenceBehavior::default(),
            },
            ..Default::default()
        },
    })
}

impl PackRenderer {
    /// Tries WebGPU first and falls back to WebGL2 unless `force_webgl`.
    pub async fn new(
        canvas: HtmlCanvasElement,
        width: u32,
        height: u32,
        force_webgl: bool,
        scene: &SceneConfig,
    ) -> Result<Self> {
        if force_webgl {
            log::info!("🔧 Forcing WebGL backend");
            return Self::create_webgl_renderer(canvas, width, height, scene).await;
        }

        log::info!("🚀 Attempting to use WebGPU backend...");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            flags: wgpu::InstanceFlags::default(),
            backend_options: wgpu::BackendOptions {
                gl: wgpu::GlBackendOptions {
                    gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
                    fence_behavior: wgpu::GlFenceBehavior::default(),
                },
                ..Default::default()
            },
        });

        // Clone canvas for potential fallback use
        let canvas_clone = canvas.clone();
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| render_err("Failed to create surface", e))?;

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => {
                log::info!("✅ Adapter acquired using: {:?}", adapter.get_info().backend);
                adapter
            }
            Err(e) => {
                log::warn!("❌ WebGPU adapter request failed: {e:?}; falling back to WebGL");
                return Self::create_webgl_renderer(canvas_clone, width, height, scene).await;
            }
        };

        Self::create_with_adapter_and_surface(adapter, surface, width, height, scene).await
    }

    async fn create_webgl_renderer(
        canvas: HtmlCanvasElement,
        width: u32,
        height: u32,
        scene: &SceneConfig,
    ) -> Result<Self> {
        let instance = gl_instance();
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| render_err("Failed to create WebGL surface", e))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| render_err("Failed to request WebGL adapter", e))?;

        log::info!("✅ WebGL adapter acquired using: {:?}", adapter.get_info().backend);
        Self::create_with_adapter_and_surface(adapter, surface, width, height, scene).await
    }

    async fn create_with_adapter_and_surface(
        adapter: wgpu::Adapter,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        scene: &SceneConfig,
    ) -> Result<Self> {
        let adapter_info = adapter.get_info();
        let device_limits = match adapter_info.backend {
            wgpu::Backend::BrowserWebGpu => wgpu::Limits::default(),
            wgpu::Backend::Gl => wgpu::Limits::downlevel_webgl2_defaults(),
            other => {
                log::warn!("⚠️ Unexpected backend {other:?}, using default limits");
                wgpu::Limits::default()
            }
        };
        log::debug!("📊 Adapter backend: {:?}", adapter_info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: device_limits,
                memory_hints: wgpu::MemoryHints::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| render_err("Failed to create device", e))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| PackError::Render("Surface reports no texture formats".into()))?;
        let present_mode = surface_caps
            .present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let width = width.max(1);
        let height = height.max(1);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, width, height);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let uniforms = Uniforms::new();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let depth_stencil = wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };
        let color_targets = [Some(wgpu::ColorTargetState {
            format: config.format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let mesh_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cell Pipeline"),
            layout: Some(&pipeline_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc(), InstanceData::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &color_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // loaded models are not guaranteed to wind consistently
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(depth_stencil.clone()),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let line_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Helper Line Pipeline"),
            layout: Some(&pipeline_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_line"),
                buffers: &[LineVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_line"),
                targets: &color_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(depth_stencil),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let grid_lines = create_lines(
            &device,
            "Grid Helper",
            &grid_helper(scene.grid_helper_size, scene.grid_helper_divisions, scene.grid_helper_y),
        );
        let axes_lines = create_lines(&device, "Axes Helper", &axes_helper(scene.axes_helper_size));

        log::info!("🎉 Renderer created ({width}x{height}, {surface_format:?})");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            mesh_pipeline,
            line_pipeline,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            mesh: None,
            instance_buffers: Vec::new(),
            uploaded_generation: None,
            grid_lines,
            axes_lines,
        })
    }

    /// Reconfigures the surface for a new backing size in physical pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 && (width, height) != (self.config.width, self.config.height) {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, width, height);
            log::debug!("Resized surface to {width}x{height}");
        }
    }

    fn upload_geometry(&mut self, geometry: &Rc<BaseGeometry>) {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cell Vertex Buffer"),
            contents: bytemuck::cast_slice(geometry.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cell Index Buffer"),
            contents: bytemuck::cast_slice(geometry.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.mesh = Some(GpuMesh {
            source: Rc::clone(geometry),
            vertex_buffer,
            index_buffer,
            num_indices: geometry.indices().len() as u32,
        });
        log::debug!("Uploaded cell geometry '{}'", geometry.name());
    }

    fn upload_instances(&mut self, instances: &[InstanceData]) {
        let max_buffer_size = self.device.limits().max_buffer_size;
        self.instance_buffers = instance_chunks(instances.len(), max_buffer_size)
            .map(|range| {
                let count = range.len() as u32;
                let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Cell Instance Buffer"),
                    contents: bytemuck::cast_slice(&instances[range]),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                (buffer, count)
            })
            .collect();
        if self.instance_buffers.len() > 1 {
            log::warn!(
                "{} instances split across {} buffers",
                instances.len(),
                self.instance_buffers.len()
            );
        }
    }

    /// Brings GPU buffers in line with the scene. Only re-uploads what changed.
    fn sync(&mut self, context: &AppContext) {
        let scene = context.scene();
        let geometry = match scene.pack() {
            Some(pack) => Some(Rc::clone(pack.geometry())),
            None => context.asset().geometry().ok().cloned(),
        };

        let Some(geometry) = geometry else {
            // nothing to draw until the cell model arrives
            self.mesh = None;
            self.upload_instances(&[]);
            self.uploaded_generation = None;
            return;
        };

        let stale_mesh = self
            .mesh
            .as_ref()
            .map_or(true, |mesh| !Rc::ptr_eq(&mesh.source, &geometry));
        if stale_mesh {
            self.upload_geometry(&geometry);
            self.uploaded_generation = None;
        }

        if self.uploaded_generation != Some(scene.generation()) {
            let instances: Vec<InstanceData> = scene
                .world_transforms()
                .into_iter()
                .map(InstanceData::new)
                .collect();
            self.upload_instances(&instances);
            self.uploaded_generation = Some(scene.generation());
        }
    }

    pub fn render(&mut self, context: &AppContext) -> Result<()> {
        self.sync(context);

        let camera = context.camera();
        self.uniforms.update(camera.view_matrix(), camera.view_projection());
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                // skip this frame, the next one uses the fresh configuration
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(render_err("Failed to get surface texture", e)),
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(context.scene().background()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            render_pass.set_pipeline(&self.line_pipeline);
            let scene = context.scene();
            for (visible, lines) in [
                (scene.show_grid_helper, &self.grid_lines),
                (scene.show_axes_helper, &self.axes_lines),
            ] {
                if visible && lines.num_vertices > 0 {
                    render_pass.set_vertex_buffer(0, lines.buffer.slice(..));
                    render_pass.draw(0..lines.num_vertices, 0..1);
                }
            }

            if let Some(mesh) = &self.mesh {
                render_pass.set_pipeline(&self.mesh_pipeline);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                for (instances, count) in &self.instance_buffers {
                    render_pass.set_vertex_buffer(1, instances.slice(..));
                    render_pass.draw_indexed(0..mesh.num_indices, 0, 0..*count);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
