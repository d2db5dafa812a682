//! Renderer: wgpu surface, depth buffer and the textured mesh pipeline.
//! wgpu = 26.x, winit = 0.30.x
//!
//! Meshes are drawn by the asset crate through [`MeshPass`]; uploads go
//! through [`WgpuDevice`]. Both implement the asset crate's GPU traits.

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use asset::gpu::ShaderProgram;
use asset::mesh::Vertex;
use bytemuck::{Pod, Zeroable};
use corelib::camera::Camera;
use glam::Mat4;
use wgpu::{
    util::DeviceExt, BindGroup, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingType, BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState,
    ColorWrites, CommandEncoderDescriptor, DepthBiasState, DepthStencilState, Device,
    DeviceDescriptor, ErrorFilter, Extent3d, Features, FragmentState, Instance,
    InstanceDescriptor, Limits, LoadOp, Operations, PipelineLayout, PipelineLayoutDescriptor,
    PolygonMode, PowerPreference, PresentMode, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, ShaderModule, ShaderModuleDescriptor,
    ShaderSource, ShaderStages, StoreOp, Surface, SurfaceConfiguration, SurfaceError,
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor, VertexBufferLayout, VertexState, VertexStepMode,
};
use winit::{dpi::PhysicalSize, window::Window};

mod device;
mod pass;
mod shader;

pub use device::{GpuMesh, GpuTexture, WgpuDevice};
pub use pass::{MaterialBindings, MeshPass, SLOT_NAMES, TextureBindings};

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x4,
    3 => Float32x2,
    4 => Float32x3,
    5 => Float32x3,
];

/// Buffer layout of [`asset::mesh::Vertex`].
pub const VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: Vertex::STRIDE,
    step_mode: VertexStepMode::Vertex,
    attributes: &VERTEX_ATTRIBUTES,
};

/// Per-frame uniform, group 0 (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    camera_pos: [f32; 4],
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.08,
    a: 1.0,
};

/// What [`GpuState::new`] needs besides the window.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub backends: wgpu::Backends,
    /// WGSL file with `vs_main`; the built-in shader when `None`.
    pub vertex_shader: Option<PathBuf>,
    /// WGSL file with `fs_main`; the built-in shader when `None`.
    pub fragment_shader: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue and uploaded resources
    gpu: WgpuDevice,

    // Pipelines
    fill_pipeline: RenderPipeline,
    line_pipeline: Option<RenderPipeline>,
    wireframe: bool,

    // Bindings
    globals_buf: Buffer,
    globals_bg: BindGroup,
    materials: MaterialBindings,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends: settings.backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("create_surface failed")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        let info = adapter.get_info();
        log::info!("Adapter: {} ({:?})", info.name, info.backend);

        let wireframe_supported = adapter.features().contains(Features::POLYGON_MODE_LINE);
        let required_features = if wireframe_supported {
            Features::POLYGON_MODE_LINE
        } else {
            Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Meshview Device"),
                required_features,
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("request_device failed")?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no formats")?;

        // Configure surface
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or_default(),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        // Depth texture
        let depth_view = create_depth_view(&device, &surface_config);

        // ==== Globals BGL/BG ====
        let globals_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Globals BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<Globals>() as u64),
                },
                count: None,
            }],
        });
        let globals_init = Globals {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0; 4],
        };
        let globals_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals UBO"),
            contents: bytemuck::bytes_of(&globals_init),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals BG"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buf.as_entire_binding(),
            }],
        });
        let materials = MaterialBindings::new(&device);

        // ==== Shaders & pipelines ====
        let vs_src = shader::load_source(
            settings.vertex_shader.as_deref(),
            shader::DEFAULT_VERTEX,
            shader::VERTEX_ENTRY,
        )?;
        let fs_src = shader::load_source(
            settings.fragment_shader.as_deref(),
            shader::DEFAULT_FRAGMENT,
            shader::FRAGMENT_ENTRY,
        )?;

        device.push_error_scope(ErrorFilter::Validation);
        let vs = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Mesh VS"),
            source: ShaderSource::Wgsl(vs_src),
        });
        let fs = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Mesh FS"),
            source: ShaderSource::Wgsl(fs_src),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Mesh PipelineLayout"),
            bind_group_layouts: &[&globals_bgl, materials.layout()],
            push_constant_ranges: &[],
        });
        let targets = PipelineTargets {
            layout: &pipeline_layout,
            vs: &vs,
            fs: &fs,
            format: surface_format,
        };
        let fill_pipeline = create_pipeline(&device, &targets, PolygonMode::Fill);
        let line_pipeline =
            wireframe_supported.then(|| create_pipeline(&device, &targets, PolygonMode::Line));
        if let Some(err) = device.pop_error_scope().await {
            bail!("Mesh pipeline rejected: {err}");
        }

        let gpu = WgpuDevice::new(device, queue)?;

        Ok(Self {
            surface,
            surface_config,
            gpu,
            fill_pipeline,
            line_pipeline,
            wireframe: false,
            globals_buf,
            globals_bg,
            materials,
            depth_view,
            width,
            height,
        })
    }

    /// Upload target for textures and meshes.
    pub fn device_mut(&mut self) -> &mut WgpuDevice {
        &mut self.gpu
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Flip between filled and line rendering. Returns the new state; stays
    /// filled when the adapter has no line polygon mode.
    pub fn toggle_wireframe(&mut self) -> bool {
        if self.line_pipeline.is_none() {
            log::warn!("Wireframe not supported by this adapter");
            return false;
        }
        self.wireframe = !self.wireframe;
        self.wireframe
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface
            .configure(self.gpu.device(), &self.surface_config);
        self.depth_view = create_depth_view(self.gpu.device(), &self.surface_config);
    }

    /// Render one frame: update globals, clear, and let `draw` issue mesh draws.
    /// Returns the number of draw calls recorded.
    pub fn render(
        &mut self,
        camera: &Camera,
        draw: impl FnOnce(&mut dyn ShaderProgram),
    ) -> Result<u32, SurfaceError> {
        let globals = Globals {
            view_proj: camera.proj_view().to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: camera.eye.extend(1.0).to_array(),
        };
        self.gpu
            .queue()
            .write_buffer(&self.globals_buf, 0, bytemuck::bytes_of(&globals));

        // --- frame & pass
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        let draws = {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None, // required in 26
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(CLEAR_COLOR),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let pipeline = match (&self.line_pipeline, self.wireframe) {
                (Some(line), true) => line,
                _ => &self.fill_pipeline,
            };
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &self.globals_bg, &[]);

            let mut program = MeshPass::new(&mut rpass, &self.gpu, &mut self.materials);
            draw(&mut program);
            program.draw_count()
        };

        self.gpu.queue().submit(Some(encoder.finish()));
        frame.present();
        Ok(draws)
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

struct PipelineTargets<'a> {
    layout: &'a PipelineLayout,
    vs: &'a ShaderModule,
    fs: &'a ShaderModule,
    format: TextureFormat,
}

fn create_pipeline(device: &Device, t: &PipelineTargets<'_>, mode: PolygonMode) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(match mode {
            PolygonMode::Line => "Mesh Pipeline (wireframe)",
            _ => "Mesh Pipeline",
        }),
        layout: Some(t.layout),
        vertex: VertexState {
            module: t.vs,
            entry_point: Some(shader::VERTEX_ENTRY),
            buffers: &[VERTEX_LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: t.fs,
            entry_point: Some(shader::FRAGMENT_ENTRY),
            targets: &[Some(ColorTargetState {
                format: t.format,
                blend: Some(BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        // imported winding is not reliable, draw both faces
        primitive: wgpu::PrimitiveState {
            cull_mode: None,
            polygon_mode: mode,
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
