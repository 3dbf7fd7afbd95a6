//! Keyed level registry.
//!
//! Levels are identified by a caller-chosen key. A [`SceneProvider`]
//! produces the CPU-side [`SceneSource`] for a key; the manager turns it
//! into GPU resources (geometry store, frame ring, draw list, mesh
//! constants) and keeps the descriptor table pointed at the active level's
//! ring. Swapping builds the incoming level completely before the outgoing
//! one is touched, so a failed load or validation leaves the old level
//! drawable.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use crate::data_structures::compositor::TransformCompositor;
use crate::data_structures::scene::SceneSource;
use crate::error::RenderError;
use crate::render::{self, DrawCall};
use crate::resources::descriptors::DescriptorTable;
use crate::resources::frame_ring::FrameResourceRing;
use crate::resources::geometry::GeometryStore;

/// Bound on the full device drain before the old level's resources are
/// released.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Produces level content for a key. Implemented for any closure so simple
/// callers can pass `|key| ...` directly.
pub trait SceneProvider<K> {
    fn load(&mut self, key: K) -> Result<SceneSource, RenderError>;
}

impl<K, F> SceneProvider<K> for F
where
    F: FnMut(K) -> Result<SceneSource, RenderError>,
{
    fn load(&mut self, key: K) -> Result<SceneSource, RenderError> {
        self(key)
    }
}

/// Identifies one loaded generation of a level. Swapping away and back
/// yields a new generation even for the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LevelHandle<K> {
    pub key: K,
    pub generation: u64,
}

/// The GPU-resident state of the currently active level.
pub struct ActiveLevel {
    pub source: SceneSource,
    pub geometry: GeometryStore,
    pub ring: FrameResourceRing,
    pub compositor: TransformCompositor,
    pub draw_list: Vec<DrawCall>,
    pub mesh_bind_group: wgpu::BindGroup,
    pub mesh_stride: u32,
    // Keeps the dynamic-offset uniform buffer alive alongside its bind
    // group.
    _mesh_constants: wgpu::Buffer,
}

impl ActiveLevel {
    /// Builds every content-sized resource for a source. Validation happens
    /// first, so nothing is allocated for a malformed scene. The descriptor
    /// table is deliberately not touched here; the manager re-points it only
    /// once the level is certain to replace the active one.
    fn build(
        device: &wgpu::Device,
        source: SceneSource,
        frame_count: u32,
        mesh_layout: &wgpu::BindGroupLayout,
    ) -> Result<Self, RenderError> {
        source.validate()?;
        let compositor = TransformCompositor::new(&source)?;
        let geometry = GeometryStore::load(device, &source.vertices, &source.indices)?;
        let ring = FrameResourceRing::new(
            device,
            frame_count,
            &compositor.to_raw(),
            &source.materials,
        )?;
        let draw_list = render::build_draw_list(&source);
        let (mesh_constants, mesh_stride) = render::mk_mesh_constant_buffer(device, &draw_list);
        let mesh_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh_constant_bind_group"),
            layout: mesh_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &mesh_constants,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<
                        crate::data_structures::scene::MeshConstants,
                    >() as u64),
                }),
            }],
        });

        Ok(Self {
            source,
            geometry,
            ring,
            compositor,
            draw_list,
            mesh_bind_group,
            mesh_stride,
            _mesh_constants: mesh_constants,
        })
    }
}

pub struct LevelManager<K, P> {
    provider: P,
    table: DescriptorTable,
    mesh_layout: wgpu::BindGroupLayout,
    active: Option<(LevelHandle<K>, ActiveLevel)>,
    generation: u64,
    frame_count: u32,
}

impl<K, P> LevelManager<K, P>
where
    K: Copy + Eq + Hash + Debug,
    P: SceneProvider<K>,
{
    /// Allocates the long-lived descriptor table and the per-draw constant
    /// layout. No level is active yet.
    pub fn new(device: &wgpu::Device, frame_count: u32, provider: P) -> Self {
        Self {
            provider,
            table: DescriptorTable::allocate(device, frame_count),
            mesh_layout: render::mk_mesh_constant_layout(device),
            active: None,
            generation: 0,
            frame_count,
        }
    }

    /// Loads and activates the first level. Fails if a level is already
    /// active; use [`swap_to`](Self::swap_to) after that.
    pub fn load_initial(
        &mut self,
        device: &wgpu::Device,
        key: K,
    ) -> Result<LevelHandle<K>, RenderError> {
        if self.active.is_some() {
            return Err(RenderError::Precondition(
                "initial load with a level already active".to_string(),
            ));
        }
        let source = self.provider.load(key)?;
        let level = ActiveLevel::build(device, source, self.frame_count, &self.mesh_layout)?;
        self.point_table_at(device, &level)?;

        self.generation += 1;
        let handle = LevelHandle {
            key,
            generation: self.generation,
        };
        log::info!("level {:?} active (generation {})", key, self.generation);
        self.active = Some((handle, level));
        Ok(handle)
    }

    /// Replaces the active level with the one behind `key`. Swapping to the
    /// already-active key is a no-op that returns the current handle. The
    /// incoming level is built in full before the device is drained and the
    /// outgoing resources are released, so any error up to that point keeps
    /// the old level running.
    pub fn swap_to(
        &mut self,
        device: &wgpu::Device,
        key: K,
    ) -> Result<LevelHandle<K>, RenderError> {
        let (current, _) = self
            .active
            .as_ref()
            .ok_or(RenderError::NotInitialized("no active level to swap from"))?;
        if current.key == key {
            return Ok(*current);
        }

        let source = self.provider.load(key)?;
        let level = ActiveLevel::build(device, source, self.frame_count, &self.mesh_layout)?;

        // Past this point the old level goes away. Drain the device so no
        // in-flight frame still reads through the old bind groups or
        // geometry when they drop.
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(TEARDOWN_TIMEOUT),
            })
            .map_err(|e| {
                RenderError::ResourceCreation(format!("device drain before swap failed: {:?}", e))
            })?;
        self.point_table_at(device, &level)?;

        self.generation += 1;
        let handle = LevelHandle {
            key,
            generation: self.generation,
        };
        let old = self.active.replace((handle, level));
        if let Some((old_handle, _)) = old {
            log::info!(
                "swapped level {:?} (generation {}) for {:?} (generation {})",
                old_handle.key,
                old_handle.generation,
                key,
                self.generation
            );
        }
        Ok(handle)
    }

    fn point_table_at(
        &mut self,
        device: &wgpu::Device,
        level: &ActiveLevel,
    ) -> Result<(), RenderError> {
        for slot in 0..self.table.slot_count() {
            let (transforms, materials) = level.ring.buffers(slot)?;
            self.table.bind_views(device, slot, transforms, materials)?;
        }
        Ok(())
    }

    pub fn active(&self) -> Result<&ActiveLevel, RenderError> {
        self.active
            .as_ref()
            .map(|(_, level)| level)
            .ok_or(RenderError::NotInitialized("no active level"))
    }

    pub fn active_mut(&mut self) -> Result<&mut ActiveLevel, RenderError> {
        self.active
            .as_mut()
            .map(|(_, level)| level)
            .ok_or(RenderError::NotInitialized("no active level"))
    }

    pub fn handle(&self) -> Option<LevelHandle<K>> {
        self.active.as_ref().map(|(handle, _)| *handle)
    }

    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    pub fn mesh_layout(&self) -> &wgpu::BindGroupLayout {
        &self.mesh_layout
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }
}
