use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::viewer::SceneLighting;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightUniformState {
    pub ambient: [f32; 4],
    pub directional: [f32; 4],
    pub direction: [f32; 4],
}

impl From<SceneLighting> for LightUniformState {
    fn from(lighting: SceneLighting) -> Self {
        Self {
            ambient: lighting.ambient.extend(1.0).to_array(),
            directional: lighting.directional.extend(1.0).to_array(),
            direction: lighting.direction.extend(0.0).to_array(),
        }
    }
}

pub struct LightUniform {
    buffer: wgpu::Buffer,
}

impl LightUniform {
    pub fn new(device: &wgpu::Device, initial_state: LightUniformState) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light uniform buffer"),
            contents: bytemuck::cast_slice(&[initial_state]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self { buffer }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn update(&self, queue: &wgpu::Queue, state: LightUniformState) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[state]));
    }
}
