//! Immutable level geometry.
//!
//! The whole level shares one vertex buffer and one index buffer; individual
//! meshes address sub-ranges through their model's `vertex_start` and
//! `index_start`. Geometry is written once at load and never mutated, so it
//! sits outside the buffered frame ring. Dropping the store releases the
//! buffers; the level registry waits for device idle before letting that
//! happen.

use wgpu::util::DeviceExt;

use crate::data_structures::scene::SceneVertex;
use crate::error::RenderError;

pub struct GeometryStore {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_count: u32,
    index_count: u32,
}

impl GeometryStore {
    pub fn load(
        device: &wgpu::Device,
        vertices: &[SceneVertex],
        indices: &[u32],
    ) -> Result<Self, RenderError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RenderError::Precondition(
                "geometry store needs at least one vertex and one index".to_string(),
            ));
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Level Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Level Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
        })
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
