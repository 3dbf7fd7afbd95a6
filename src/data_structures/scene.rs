//! The shared scene content model.
//!
//! A [`SceneSource`] is everything a level needs on the CPU side: vertex and
//! index pools, per-instance transforms, material attributes and the mesh /
//! model / instance tables that the draw list is built from. Providers hand
//! a `SceneSource` to the level registry, which validates it before any GPU
//! resource is created.

use cgmath::{Matrix4, Point3};

use crate::data_structures::compositor;
use crate::error::RenderError;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// One vertex of the shared pool. Positions, texture coordinates and normals
/// are interleaved the way the pipeline's vertex stage expects them.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneVertex {
    pub position: [f32; 3],
    pub uvw: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex for SceneVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<SceneVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// A world transform laid out for the per-slot storage buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformRaw {
    pub model: [[f32; 4]; 4],
}

impl From<Matrix4<f32>> for TransformRaw {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self {
            model: matrix.into(),
        }
    }
}

/// Material attributes as the fragment stage reads them from the per-slot
/// material storage buffer. Scalars ride in the w component of the colour
/// they belong with so the struct packs without padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialAttributes {
    /// rgb diffuse, w dissolve
    pub diffuse: [f32; 4],
    /// rgb specular, w shininess
    pub specular: [f32; 4],
    /// rgb ambient, w sharpness
    pub ambient: [f32; 4],
    /// rgb transmission filter, w index of refraction
    pub transmission: [f32; 4],
    /// rgb emissive
    pub emissive: [f32; 3],
    pub illum: u32,
}

impl Default for MaterialAttributes {
    fn default() -> Self {
        Self {
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.2, 0.2, 0.2, 32.0],
            ambient: [1.0, 1.0, 1.0, 0.0],
            transmission: [0.0, 0.0, 0.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            illum: 2,
        }
    }
}

/// The sun. Direction is in world space and not required to be normalized;
/// the shader normalizes it once per fragment.
pub struct SunLight {
    pub direction: [f32; 3],
    pub color: [f32; 4],
    pub ambient: [f32; 4],
}

impl Default for SunLight {
    fn default() -> Self {
        Self {
            direction: [-1.0, -1.0, 2.0],
            color: [0.9, 0.9, 1.0, 1.0],
            ambient: [0.75, 0.9, 0.9, 0.0],
        }
    }
}

/// Per-frame constants, uploaded once per rendered frame into a uniform
/// buffer. Writes are queue-ordered, so a single buffer suffices for all
/// frames in flight.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneConstants {
    pub view_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub sun_direction: [f32; 4],
    pub sun_color: [f32; 4],
    pub sun_ambient: [f32; 4],
}

impl SceneConstants {
    pub fn new(view_projection: Matrix4<f32>, eye: Point3<f32>, sun: &SunLight) -> Self {
        Self {
            view_projection: view_projection.into(),
            camera_position: [eye.x, eye.y, eye.z, 1.0],
            sun_direction: [sun.direction[0], sun.direction[1], sun.direction[2], 0.0],
            sun_color: sun.color,
            sun_ambient: sun.ambient,
        }
    }
}

/// Per-draw constants, packed once per level into a dynamic-offset uniform
/// buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshConstants {
    pub material_index: u32,
    pub transform_start: u32,
}

/// One mesh of a model, addressing a sub-range of the model's index range.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Offset into the owning model's index range.
    pub index_offset: u32,
    pub index_count: u32,
    pub material_index: u32,
}

/// A model groups meshes and owns a contiguous slice of the vertex and index
/// pools.
#[derive(Clone, Debug)]
pub struct Model {
    pub mesh_start: u32,
    pub mesh_count: u32,
    pub vertex_start: u32,
    pub index_start: u32,
    pub index_count: u32,
}

/// A placed copy of a model, owning a contiguous run of transforms.
#[derive(Clone, Debug)]
pub struct ModelInstance {
    pub model_index: u32,
    pub transform_start: u32,
    pub transform_count: u32,
}

/// Built-in per-frame behaviours an object can opt into.
#[derive(Clone, Copy, Debug)]
pub enum ObjectRole {
    /// Rotate the object's local transform around its own Y axis.
    Spinner { degrees_per_second: f32 },
}

/// A scene object wraps one transform slot and optionally links it to a
/// parent transform and a runtime role.
#[derive(Clone, Debug)]
pub struct SceneObject {
    pub transform_index: u32,
    pub parent: Option<u32>,
    pub role: Option<ObjectRole>,
}

/// Everything a level contributes. Providers build this however they like
/// (procedurally, from files, over the network); the registry only ever sees
/// the finished source.
pub struct SceneSource {
    pub vertices: Vec<SceneVertex>,
    pub indices: Vec<u32>,
    /// Local transforms, one per slot. The compositor turns these into world
    /// transforms every frame.
    pub transforms: Vec<Matrix4<f32>>,
    pub objects: Vec<SceneObject>,
    pub materials: Vec<MaterialAttributes>,
    pub meshes: Vec<Mesh>,
    pub models: Vec<Model>,
    pub instances: Vec<ModelInstance>,
}

impl SceneSource {
    /// Checks every cross-table reference before any GPU resource is
    /// created, so a rejected source never leaves a half-built level behind.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(RenderError::SceneLoad(
                "scene has no geometry".to_string(),
            ));
        }
        if self.transforms.is_empty() {
            return Err(RenderError::SceneLoad(
                "scene has no transforms".to_string(),
            ));
        }
        if self.materials.is_empty() {
            return Err(RenderError::SceneLoad(
                "scene has no materials".to_string(),
            ));
        }

        for (i, mesh) in self.meshes.iter().enumerate() {
            if mesh.material_index as usize >= self.materials.len() {
                return Err(RenderError::SceneLoad(format!(
                    "mesh {} references material {} but only {} exist",
                    i,
                    mesh.material_index,
                    self.materials.len()
                )));
            }
        }

        for (i, model) in self.models.iter().enumerate() {
            let mesh_end = model.mesh_start as usize + model.mesh_count as usize;
            if mesh_end > self.meshes.len() {
                return Err(RenderError::SceneLoad(format!(
                    "model {} mesh range {}..{} exceeds mesh table of {}",
                    i, model.mesh_start, mesh_end, self.meshes.len()
                )));
            }
            let index_end = model.index_start as usize + model.index_count as usize;
            if index_end > self.indices.len() {
                return Err(RenderError::SceneLoad(format!(
                    "model {} index range {}..{} exceeds index pool of {}",
                    i, model.index_start, index_end, self.indices.len()
                )));
            }
            if (model.vertex_start as usize) > self.vertices.len() {
                return Err(RenderError::SceneLoad(format!(
                    "model {} vertex start {} exceeds vertex pool of {}",
                    i, model.vertex_start, self.vertices.len()
                )));
            }
            for (j, mesh) in self.meshes
                [model.mesh_start as usize..mesh_end]
                .iter()
                .enumerate()
            {
                if mesh.index_offset as usize + mesh.index_count as usize
                    > model.index_count as usize
                {
                    return Err(RenderError::SceneLoad(format!(
                        "mesh {} of model {} overruns the model's index range",
                        model.mesh_start as usize + j,
                        i
                    )));
                }
            }
        }

        for (i, instance) in self.instances.iter().enumerate() {
            if instance.model_index as usize >= self.models.len() {
                return Err(RenderError::SceneLoad(format!(
                    "instance {} references model {} but only {} exist",
                    i,
                    instance.model_index,
                    self.models.len()
                )));
            }
            let transform_end =
                instance.transform_start as usize + instance.transform_count as usize;
            if transform_end > self.transforms.len() {
                return Err(RenderError::SceneLoad(format!(
                    "instance {} transform range {}..{} exceeds {} transforms",
                    i, instance.transform_start, transform_end, self.transforms.len()
                )));
            }
        }

        for (i, object) in self.objects.iter().enumerate() {
            if object.transform_index as usize >= self.transforms.len() {
                return Err(RenderError::InvalidSceneGraph(format!(
                    "object {} owns transform {} but only {} exist",
                    i,
                    object.transform_index,
                    self.transforms.len()
                )));
            }
        }
        // Rejects self-parents, cycles, dangling parents and duplicate owners.
        compositor::processing_order(&self.objects, self.transforms.len())?;

        Ok(())
    }
}
