//! wgpu renderer for the scene graph.
//!
//! The renderer mirrors every scene node with GPU resources created the
//! first time the node is drawn. Point attributes are re-uploaded only when
//! their buffer is flagged `needs_update`; mesh transforms are rewritten
//! every frame.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::camera::PerspectiveCamera;
use crate::error::GpuError;
use crate::scene::{Mesh, Node, PointCloud, Scene};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const POINTS_SHADER: &str = include_str!("points.wgsl");
const MESH_SHADER: &str = include_str!("mesh.wgsl");

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CameraUniforms {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    viewport: [f32; 4],
    ambient: [f32; 4],
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PointsParams {
    opacity: f32,
    size_attenuation: u32,
    _padding: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct MeshParams {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    lit: u32,
    _padding: [u32; 3],
}

struct PointsGpu {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    sizes: wgpu::Buffer,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    count: u32,
}

struct MeshGpu {
    positions: wgpu::Buffer,
    normals: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    double_sided: bool,
}

enum NodeGpu {
    Points(PointsGpu),
    Mesh(MeshGpu),
}

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    scale_factor: f32,
    depth_texture: wgpu::TextureView,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    node_layout: wgpu::BindGroupLayout,
    points_pipeline: wgpu::RenderPipeline,
    mesh_pipeline: wgpu::RenderPipeline,
    mesh_pipeline_double_sided: wgpu::RenderPipeline,
    /// Indexed by `NodeId::index`.
    nodes: Vec<Option<NodeGpu>>,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();
        let scale_factor = window.scale_factor() as f32;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        log::info!("using adapter {:?}", adapter.get_info().name);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = create_depth_texture(&device, &config);

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform Buffer"),
            size: std::mem::size_of::<CameraUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_layout = uniform_layout(&device, "Camera Bind Group Layout", wgpu::ShaderStages::VERTEX_FRAGMENT);
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let node_layout = uniform_layout(&device, "Node Bind Group Layout", wgpu::ShaderStages::VERTEX_FRAGMENT);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &node_layout],
            push_constant_ranges: &[],
        });

        let points_pipeline = create_points_pipeline(&device, &pipeline_layout, config.format);
        let mesh_pipeline = create_mesh_pipeline(&device, &pipeline_layout, config.format, Some(wgpu::Face::Back));
        let mesh_pipeline_double_sided = create_mesh_pipeline(&device, &pipeline_layout, config.format, None);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            scale_factor,
            depth_texture,
            camera_buffer,
            camera_bind_group,
            node_layout,
            points_pipeline,
            mesh_pipeline,
            mesh_pipeline_double_sided,
            nodes: Vec::new(),
        })
    }

    /// Resize the output surface. Zero-sized (minimized) windows are ignored.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>, scale_factor: f64) {
        self.scale_factor = scale_factor as f32;
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture = create_depth_texture(&self.device, &self.config);
        }
    }

    /// Reconfigure the surface at its current size, after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn write_camera(&self, scene: &Scene, camera: &PerspectiveCamera) {
        let (sun_direction, sun_color) = match scene.sun {
            Some(sun) => (sun.direction.extend(sun.intensity), sun.color.extend(1.0)),
            None => (glam::Vec4::ZERO, glam::Vec4::ZERO),
        };
        let uniforms = CameraUniforms {
            view: camera.view_matrix().to_cols_array_2d(),
            proj: camera.projection_matrix().to_cols_array_2d(),
            viewport: [
                self.config.width as f32,
                self.config.height as f32,
                self.scale_factor,
                0.0,
            ],
            ambient: scene.ambient_light.extend(1.0).to_array(),
            sun_direction: sun_direction.to_array(),
            sun_color: sun_color.to_array(),
        };
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Create GPU mirrors for new nodes and upload whatever changed.
    fn prepare(&mut self, scene: &mut Scene) {
        if self.nodes.len() < scene.len() {
            self.nodes.resize_with(scene.len(), || None);
        }

        for (id, node) in scene.iter_mut() {
            let slot = &mut self.nodes[id.index()];
            match (node, slot) {
                (Node::Points(points), Some(NodeGpu::Points(gpu))) => {
                    sync_points(&self.queue, points, gpu);
                }
                (Node::Mesh(mesh), Some(NodeGpu::Mesh(gpu))) => {
                    sync_mesh(&self.queue, mesh, gpu);
                }
                (Node::Points(points), slot) => {
                    *slot = Some(NodeGpu::Points(create_points(&self.device, &self.node_layout, points)));
                }
                (Node::Mesh(mesh), slot) => {
                    *slot = Some(NodeGpu::Mesh(create_mesh(&self.device, &self.node_layout, mesh)));
                }
            }
        }
    }

    pub fn render(&mut self, scene: &mut Scene, camera: &PerspectiveCamera) -> Result<(), wgpu::SurfaceError> {
        self.write_camera(scene, camera);
        self.prepare(scene);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let background = scene.background;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background.x as f64,
                            g: background.y as f64,
                            b: background.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);

            for gpu in self.nodes.iter().flatten() {
                match gpu {
                    NodeGpu::Points(points) => {
                        if points.count == 0 {
                            continue;
                        }
                        render_pass.set_pipeline(&self.points_pipeline);
                        render_pass.set_bind_group(1, &points.bind_group, &[]);
                        render_pass.set_vertex_buffer(0, points.positions.slice(..));
                        render_pass.set_vertex_buffer(1, points.colors.slice(..));
                        render_pass.set_vertex_buffer(2, points.sizes.slice(..));
                        render_pass.draw(0..6, 0..points.count);
                    }
                    NodeGpu::Mesh(mesh) => {
                        if mesh.index_count == 0 {
                            continue;
                        }
                        let pipeline = if mesh.double_sided {
                            &self.mesh_pipeline_double_sided
                        } else {
                            &self.mesh_pipeline
                        };
                        render_pass.set_pipeline(pipeline);
                        render_pass.set_bind_group(1, &mesh.bind_group, &[]);
                        render_pass.set_vertex_buffer(0, mesh.positions.slice(..));
                        render_pass.set_vertex_buffer(1, mesh.normals.slice(..));
                        render_pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

/// Per-point colors as drawn: the color attribute, or the material color repeated.
fn point_colors(points: &PointCloud) -> Vec<f32> {
    match (&points.colors, points.material.vertex_colors) {
        (Some(colors), true) => colors.as_slice().to_vec(),
        _ => points.material.color.to_array().repeat(points.count()),
    }
}

/// Per-point sizes as drawn: the size attribute, or the material size repeated.
fn point_sizes(points: &PointCloud) -> Vec<f32> {
    match &points.sizes {
        Some(sizes) => sizes.as_slice().to_vec(),
        None => vec![points.material.size; points.count()],
    }
}

fn points_params(points: &PointCloud) -> PointsParams {
    PointsParams {
        opacity: points.material.opacity,
        size_attenuation: points.material.size_attenuation as u32,
        _padding: [0.0; 2],
    }
}

fn mesh_params(mesh: &Mesh) -> MeshParams {
    MeshParams {
        model: mesh.transform.matrix().to_cols_array_2d(),
        color: mesh.material.color.extend(mesh.material.opacity).to_array(),
        lit: mesh.material.lit as u32,
        _padding: [0; 3],
    }
}

fn create_points(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, points: &mut PointCloud) -> PointsGpu {
    let positions = vertex_buffer(device, "Point Positions", points.positions.as_slice());
    let colors = vertex_buffer(device, "Point Colors", &point_colors(points));
    let sizes = vertex_buffer(device, "Point Sizes", &point_sizes(points));
    points.positions.take_dirty();
    if let Some(colors) = points.colors.as_mut() {
        colors.take_dirty();
    }
    if let Some(sizes) = points.sizes.as_mut() {
        sizes.take_dirty();
    }

    let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Points Params"),
        contents: bytemuck::bytes_of(&points_params(points)),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let bind_group = uniform_bind_group(device, layout, "Points Bind Group", &params);

    PointsGpu {
        positions,
        colors,
        sizes,
        params,
        bind_group,
        count: points.count() as u32,
    }
}

fn sync_points(queue: &wgpu::Queue, points: &mut PointCloud, gpu: &mut PointsGpu) {
    if points.positions.take_dirty() {
        queue.write_buffer(&gpu.positions, 0, bytemuck::cast_slice(points.positions.as_slice()));
    }
    let colors_dirty = points.colors.as_mut().is_some_and(|c| c.take_dirty());
    if colors_dirty {
        queue.write_buffer(&gpu.colors, 0, bytemuck::cast_slice(&point_colors(points)));
    }
    if let Some(sizes) = points.sizes.as_mut() {
        if sizes.take_dirty() {
            queue.write_buffer(&gpu.sizes, 0, bytemuck::cast_slice(sizes.as_slice()));
        }
    }
    queue.write_buffer(&gpu.params, 0, bytemuck::bytes_of(&points_params(points)));
}

fn create_mesh(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, mesh: &Mesh) -> MeshGpu {
    let geometry = &mesh.geometry;
    let positions = vertex_buffer(device, "Mesh Positions", bytemuck::cast_slice(&geometry.positions));
    let normals = vertex_buffer(device, "Mesh Normals", bytemuck::cast_slice(&geometry.normals));

    let mut index_data = geometry.indices.clone();
    if index_data.is_empty() {
        index_data.extend_from_slice(&[0, 0, 0, 0]);
    }
    let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Mesh Indices"),
        contents: bytemuck::cast_slice(&index_data),
        usage: wgpu::BufferUsages::INDEX,
    });

    let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Mesh Params"),
        contents: bytemuck::bytes_of(&mesh_params(mesh)),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let bind_group = uniform_bind_group(device, layout, "Mesh Bind Group", &params);

    MeshGpu {
        positions,
        normals,
        indices,
        index_count: geometry.indices.len() as u32,
        params,
        bind_group,
        double_sided: mesh.material.double_sided,
    }
}

fn sync_mesh(queue: &wgpu::Queue, mesh: &Mesh, gpu: &mut MeshGpu) {
    gpu.double_sided = mesh.material.double_sided;
    queue.write_buffer(&gpu.params, 0, bytemuck::bytes_of(&mesh_params(mesh)));
}

/// Vertex buffer holding `data`, padded so it is never zero-sized.
fn vertex_buffer(device: &wgpu::Device, label: &str, data: &[f32]) -> wgpu::Buffer {
    let mut contents = data.to_vec();
    if contents.len() < 4 {
        contents.resize(4, 0.0);
    }
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&contents),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    })
}

fn uniform_layout(device: &wgpu::Device, label: &str, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    label: &str,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

/// Depth-tested state. Blended point sprites test but do not write, so
/// their transparent rims never hide what is drawn after them.
fn depth_stencil(depth_write_enabled: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const SIZE_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];

/// One attribute per point, advanced per instance of the quad.
fn instance_layout(
    stride: wgpu::BufferAddress,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes,
    }
}

fn create_points_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Points Shader"),
        source: wgpu::ShaderSource::Wgsl(POINTS_SHADER.into()),
    });

    let buffers = [
        instance_layout(12, &POSITION_ATTRIBUTES),
        instance_layout(12, &COLOR_ATTRIBUTES),
        instance_layout(4, &SIZE_ATTRIBUTES),
    ];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Points Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(depth_stencil(false)),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    cull_mode: Option<wgpu::Face>,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(MESH_SHADER.into()),
    });

    let buffers = [
        wgpu::VertexBufferLayout {
            array_stride: 12,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &POSITION_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: 12,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &NORMAL_ATTRIBUTES,
        },
    ];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Mesh Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            ..Default::default()
        },
        depth_stencil: Some(depth_stencil(true)),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
