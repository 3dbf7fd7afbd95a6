//! Draw-list construction and per-frame command submission.
//!
//! The draw list is derived once per level: for every model instance, one
//! entry per mesh of its model, in instance order. Each entry becomes one
//! instanced indexed draw whose instance count is the number of transforms
//! the instance owns. The vertex stage resolves the per-instance transform
//! as `transform_start + instance_index`.

use wgpu::util::DeviceExt;

use crate::context::Context;
use crate::data_structures::scene::{MeshConstants, SceneConstants};
use crate::error::RenderError;
use crate::levels::ActiveLevel;
use crate::pipelines::basic;
use crate::resources::descriptors::DescriptorTable;

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub first_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
    pub instance_count: u32,
    pub material_index: u32,
    pub transform_start: u32,
}

/// Flattens a scene into draw calls, instance-major and mesh-minor. The
/// source must already have passed validation.
pub fn build_draw_list(source: &crate::data_structures::scene::SceneSource) -> Vec<DrawCall> {
    let mut draws = Vec::new();
    for instance in &source.instances {
        let model = &source.models[instance.model_index as usize];
        let meshes = &source.meshes
            [model.mesh_start as usize..(model.mesh_start + model.mesh_count) as usize];
        for mesh in meshes {
            draws.push(DrawCall {
                first_index: model.index_start + mesh.index_offset,
                index_count: mesh.index_count,
                base_vertex: model.vertex_start as i32,
                instance_count: instance.transform_count,
                material_index: mesh.material_index,
                transform_start: instance.transform_start,
            });
        }
    }
    draws
}

/// The dynamic-offset stride for one `MeshConstants` entry, rounded up to
/// the device's uniform offset alignment.
pub fn mesh_constant_stride(device: &wgpu::Device) -> u32 {
    let align = device.limits().min_uniform_buffer_offset_alignment;
    (std::mem::size_of::<MeshConstants>() as u32).div_ceil(align) * align
}

/// Packs one `MeshConstants` entry per draw call at stride offsets into a
/// single uniform buffer bound with a dynamic offset.
pub fn mk_mesh_constant_buffer(
    device: &wgpu::Device,
    draws: &[DrawCall],
) -> (wgpu::Buffer, u32) {
    let stride = mesh_constant_stride(device);
    let len = (stride as usize) * draws.len().max(1);
    let mut contents = vec![0u8; len];
    for (i, draw) in draws.iter().enumerate() {
        let constants = MeshConstants {
            material_index: draw.material_index,
            transform_start: draw.transform_start,
        };
        let offset = i * stride as usize;
        contents[offset..offset + std::mem::size_of::<MeshConstants>()]
            .copy_from_slice(bytemuck::bytes_of(&constants));
    }
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Mesh Constant Buffer"),
        contents: &contents,
        usage: wgpu::BufferUsages::UNIFORM,
    });
    (buffer, stride)
}

pub(crate) fn mk_mesh_constant_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("mesh_constant_bind_group_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(
                    std::mem::size_of::<MeshConstants>() as u64
                ),
            },
            count: None,
        }],
    })
}

/// Owns the pipeline and the per-frame scene constants. Lives across level
/// swaps; only the descriptor table contents change underneath it.
pub struct LevelRenderer {
    pipeline: wgpu::RenderPipeline,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
}

impl LevelRenderer {
    pub fn new(
        ctx: &Context,
        frame_slot_layout: &wgpu::BindGroupLayout,
        mesh_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let scene_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("scene_bind_group_layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
        let scene_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Constant Buffer"),
            size: std::mem::size_of::<SceneConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });
        let pipeline = basic::mk_level_pipeline(
            &ctx.device,
            &ctx.config,
            &scene_layout,
            frame_slot_layout,
            mesh_layout,
        );

        Self {
            pipeline,
            scene_buffer,
            scene_bind_group,
        }
    }

    /// Records and submits the frame's single render pass. Returns the
    /// submission index the caller hands back to the frame ring as this
    /// slot's fence.
    pub fn submit(
        &self,
        ctx: &Context,
        view: &wgpu::TextureView,
        table: &DescriptorTable,
        level: &ActiveLevel,
        slot: usize,
        scene: &SceneConstants,
    ) -> Result<wgpu::SubmissionIndex, RenderError> {
        // Fails before anything is recorded if the slot was never bound.
        let slot_bind_group = table.bind_group(slot)?;

        ctx.queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(scene));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Level Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Level Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
            render_pass.set_bind_group(1, slot_bind_group, &[]);
            render_pass.set_vertex_buffer(0, level.geometry.vertex_buffer().slice(..));
            render_pass.set_index_buffer(
                level.geometry.index_buffer().slice(..),
                wgpu::IndexFormat::Uint32,
            );

            for (i, draw) in level.draw_list.iter().enumerate() {
                render_pass.set_bind_group(
                    2,
                    &level.mesh_bind_group,
                    &[i as u32 * level.mesh_stride],
                );
                render_pass.draw_indexed(
                    draw.first_index..draw.first_index + draw.index_count,
                    draw.base_vertex,
                    0..draw.instance_count,
                );
            }
        }

        Ok(ctx.queue.submit(std::iter::once(encoder.finish())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::scene::{
        MaterialAttributes, Mesh, Model, ModelInstance, SceneObject, SceneSource, SceneVertex,
    };
    use cgmath::{Matrix4, SquareMatrix};

    fn model_scene() -> SceneSource {
        // One model of three meshes, placed twice: three transforms per
        // placement.
        SceneSource {
            vertices: vec![
                SceneVertex {
                    position: [0.0; 3],
                    uvw: [0.0; 3],
                    normal: [0.0, 1.0, 0.0],
                };
                4
            ],
            indices: vec![0; 12],
            transforms: vec![Matrix4::identity(); 6],
            objects: (0..6)
                .map(|i| SceneObject {
                    transform_index: i,
                    parent: None,
                    role: None,
                })
                .collect(),
            materials: vec![MaterialAttributes::default(); 2],
            meshes: vec![
                Mesh {
                    index_offset: 0,
                    index_count: 3,
                    material_index: 0,
                },
                Mesh {
                    index_offset: 3,
                    index_count: 6,
                    material_index: 1,
                },
                Mesh {
                    index_offset: 9,
                    index_count: 3,
                    material_index: 0,
                },
            ],
            models: vec![Model {
                mesh_start: 0,
                mesh_count: 3,
                vertex_start: 0,
                index_start: 0,
                index_count: 12,
            }],
            instances: vec![
                ModelInstance {
                    model_index: 0,
                    transform_start: 0,
                    transform_count: 3,
                },
                ModelInstance {
                    model_index: 0,
                    transform_start: 3,
                    transform_count: 3,
                },
            ],
        }
    }

    #[test]
    fn two_instances_of_a_three_mesh_model_yield_six_draws() {
        let scene = model_scene();
        assert!(scene.validate().is_ok());
        let draws = build_draw_list(&scene);
        assert_eq!(draws.len(), 6);
    }

    #[test]
    fn draws_are_instance_major_mesh_minor() {
        let draws = build_draw_list(&model_scene());
        // First instance's three meshes come first.
        assert_eq!(draws[0].transform_start, 0);
        assert_eq!(draws[2].transform_start, 0);
        assert_eq!(draws[3].transform_start, 3);
        // Mesh order within an instance follows the model's mesh table.
        assert_eq!(draws[0].first_index, 0);
        assert_eq!(draws[1].first_index, 3);
        assert_eq!(draws[1].index_count, 6);
        assert_eq!(draws[2].first_index, 9);
        assert_eq!(draws[1].material_index, 1);
    }

    #[test]
    fn draw_fields_address_the_shared_pools() {
        let mut scene = model_scene();
        scene.models[0].vertex_start = 2;
        scene.models[0].index_start = 0;
        let draws = build_draw_list(&scene);
        assert!(draws.iter().all(|d| d.base_vertex == 2));
        assert!(draws.iter().all(|d| d.instance_count == 3));
    }

    #[test]
    fn empty_instance_table_yields_no_draws() {
        let mut scene = model_scene();
        scene.instances.clear();
        assert!(build_draw_list(&scene).is_empty());
    }
}
