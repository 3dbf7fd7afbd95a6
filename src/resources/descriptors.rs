//! The per-slot descriptor table.
//!
//! The bind group layout for per-frame instance data is allocated once and
//! outlives level swaps, so the pipeline never needs rebuilding. The bind
//! groups themselves point at a specific level's ring buffers and are
//! recreated per slot whenever the ring is replaced.

use crate::error::RenderError;

pub struct DescriptorTable {
    layout: wgpu::BindGroupLayout,
    slots: Vec<Option<wgpu::BindGroup>>,
}

impl DescriptorTable {
    /// One table entry per frame slot. Binding 0 is the transform storage
    /// buffer (vertex stage), binding 1 the material storage buffer
    /// (fragment stage).
    pub fn allocate(device: &wgpu::Device, slot_count: u32) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_slot_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        Self {
            layout,
            slots: (0..slot_count).map(|_| None).collect(),
        }
    }

    /// Re-points one slot at a new pair of ring buffers. Callers must have
    /// ensured the device is no longer reading through the old bind group.
    pub fn bind_views(
        &mut self,
        device: &wgpu::Device,
        slot: usize,
        transforms: &wgpu::Buffer,
        materials: &wgpu::Buffer,
    ) -> Result<(), RenderError> {
        let entry = self.slots.get_mut(slot).ok_or_else(|| {
            RenderError::Precondition(format!(
                "slot {} out of range for a table of {}",
                slot,
                self.slots.len()
            ))
        })?;
        *entry = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("frame_slot_bind_group_{slot}")),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: transforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: materials.as_entire_binding(),
                },
            ],
        }));
        Ok(())
    }

    pub fn bind_group(&self, slot: usize) -> Result<&wgpu::BindGroup, RenderError> {
        let entry = self.slots.get(slot).ok_or_else(|| {
            RenderError::Precondition(format!(
                "slot {} out of range for a table of {}",
                slot,
                self.slots.len()
            ))
        })?;
        entry
            .as_ref()
            .ok_or(RenderError::NotInitialized("descriptor table slot unbound"))
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
