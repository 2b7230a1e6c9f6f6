use std::mem::offset_of;

use glam::Mat4;
use id_arena::{Arena, Id};
use wgpu::util::DeviceExt;

use crate::model::{Model, ModelPrimitive, Vertex};
use crate::scene_graph::{ObjectKind, Scene};

pub type RenderModelId = Id<RenderModel>;

pub struct RenderPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl RenderPrimitive {
    fn from_primitive(device: &wgpu::Device, model: &Model, primitive: &ModelPrimitive) -> Self {
        let vertex_buffer_name = format!(
            "Vertex buffer ({}, primitive {})",
            model.name, primitive.index
        );
        let index_buffer_name = format!(
            "Index buffer ({}, primitive {})",
            model.name, primitive.index
        );

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&vertex_buffer_name),
            contents: bytemuck::cast_slice(&primitive.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&index_buffer_name),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: primitive.indices.len() as u32,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Instance {
    pub model: Mat4,
    pub normal: Mat4,
}

pub struct RenderModel {
    pub name: String,
    pub primitives: Vec<RenderPrimitive>,
    pub instances: Vec<Instance>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
}

impl RenderModel {
    const INITIAL_INSTANCES: usize = 16;

    pub fn from_model(device: &wgpu::Device, model: &Model) -> Self {
        let primitives = model
            .primitives
            .iter()
            .map(|primitive| RenderPrimitive::from_primitive(device, model, primitive))
            .collect();

        RenderModel {
            name: model.name.clone(),
            primitives,
            instances: Vec::new(),
            instance_buffer: create_instance_buffer(device, &model.name, Self::INITIAL_INSTANCES),
            instance_capacity: Self::INITIAL_INSTANCES,
        }
    }

    pub fn should_render(&self) -> bool {
        !self.instances.is_empty()
    }

    /// Uploads this frame's instances, growing the buffer when needed.
    pub fn write_instances(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.instances.len() > self.instance_capacity {
            self.instance_capacity = self.instances.len().next_power_of_two();
            self.instance_buffer =
                create_instance_buffer(device, &self.name, self.instance_capacity);
        }

        if self.should_render() {
            queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice(&self.instances),
            );
        }
    }
}

fn create_instance_buffer(device: &wgpu::Device, name: &str, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("Instance buffer ({})", name)),
        size: (std::mem::size_of::<Instance>() * capacity) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Collects world matrices of every mesh object into its render model.
pub fn gather_instances(scene: &Scene, render_models: &mut Arena<RenderModel>) {
    for (_, render_model) in render_models.iter_mut() {
        render_model.instances.clear();
    }

    for (_, object) in scene.objects.iter() {
        let ObjectKind::Mesh(model_id) = object.kind else {
            continue;
        };

        let Some(render_model_id) = scene.models.get(model_id).and_then(|m| m.render_model) else {
            continue;
        };

        if let Some(render_model) = render_models.get_mut(render_model_id) {
            render_model.instances.push(Instance {
                model: *object.transform.world_matrix(),
                normal: *object.transform.normal_matrix(),
            });
        }
    }
}

pub fn render_model_instances(render_pass: &mut wgpu::RenderPass<'_>, render_model: &RenderModel) {
    render_pass.set_vertex_buffer(1, render_model.instance_buffer.slice(..));

    for primitive in &render_model.primitives {
        render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
        render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(
            0..primitive.num_indices,
            0,
            0..render_model.instances.len() as u32,
        );
    }
}

pub const RENDER_MODEL_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, color) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x4,
        },
    ],
};

pub const INSTANCE_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Instance>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
        10 => Float32x4,
    ],
};
