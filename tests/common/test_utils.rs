//! Shared helpers for device-backed integration tests: a headless device,
//! small procedural scenes and a buffer readback path.

use cgmath::{Matrix4, SquareMatrix, Vector3};
use strata_ngin::data_structures::scene::{
    MaterialAttributes, Mesh, Model, ModelInstance, ObjectRole, SceneObject, SceneSource,
    SceneVertex,
};

pub async fn request_test_device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .expect("no adapter available for tests");
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("test device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .expect("device request failed")
}

fn quad_vertices() -> Vec<SceneVertex> {
    [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ]
    .iter()
    .map(|&position| SceneVertex {
        position,
        uvw: [0.0; 3],
        normal: [0.0, 0.0, 1.0],
    })
    .collect()
}

/// One single-mesh model placed once, with a parented second transform and a
/// spinner so per-frame content actually changes.
pub fn scene_a() -> SceneSource {
    SceneSource {
        vertices: quad_vertices(),
        indices: vec![0, 1, 2, 0, 2, 3],
        transforms: vec![
            Matrix4::from_translation(Vector3::new(2.0, 0.0, 0.0)),
            Matrix4::identity(),
        ],
        objects: vec![
            SceneObject {
                transform_index: 0,
                parent: None,
                role: Some(ObjectRole::Spinner {
                    degrees_per_second: 90.0,
                }),
            },
            SceneObject {
                transform_index: 1,
                parent: Some(0),
                role: None,
            },
        ],
        materials: vec![MaterialAttributes::default()],
        meshes: vec![Mesh {
            index_offset: 0,
            index_count: 6,
            material_index: 0,
        }],
        models: vec![Model {
            mesh_start: 0,
            mesh_count: 1,
            vertex_start: 0,
            index_start: 0,
            index_count: 6,
        }],
        instances: vec![ModelInstance {
            model_index: 0,
            transform_start: 0,
            transform_count: 2,
        }],
    }
}

/// One three-mesh model placed twice: six draws, six transforms, two
/// materials.
pub fn scene_b() -> SceneSource {
    SceneSource {
        vertices: quad_vertices(),
        indices: vec![0, 1, 2, 0, 2, 3, 1, 2, 3, 0, 1, 3],
        transforms: (0..6)
            .map(|i| Matrix4::from_translation(Vector3::new(i as f32, 0.0, 0.0)))
            .collect(),
        objects: (0..6)
            .map(|i| SceneObject {
                transform_index: i,
                parent: None,
                role: None,
            })
            .collect(),
        materials: vec![MaterialAttributes::default(), MaterialAttributes::default()],
        meshes: vec![
            Mesh {
                index_offset: 0,
                index_count: 6,
                material_index: 0,
            },
            Mesh {
                index_offset: 6,
                index_count: 3,
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

/// Copies a device-local buffer into a staging buffer and maps it back.
pub async fn read_back<T: bytemuck::Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    count: usize,
) -> Vec<T> {
    let size = (count * std::mem::size_of::<T>()) as wgpu::BufferAddress;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        sender.send(result).unwrap();
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .unwrap();
    receiver.receive().await.unwrap().unwrap();

    let data = bytemuck::cast_slice(&slice.get_mapped_range()).to_vec();
    staging.unmap();
    data
}
