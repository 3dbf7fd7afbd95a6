//! The buffered frame ring.
//!
//! Per-frame mutable data (world transforms and material attributes) exists
//! once per frame in flight. Writing into a slot first waits on the fence of
//! the last submission that read from that slot, so the CPU never overwrites
//! a buffer the GPU may still be scanning out. Slots are primed with the
//! level's initial content at creation, so a slot that has never been
//! written still draws a consistent frame.

use std::time::Duration;

use wgpu::util::DeviceExt;

use crate::data_structures::scene::{MaterialAttributes, TransformRaw};
use crate::error::RenderError;

/// A fence wait longer than this means the device has effectively hung.
const FENCE_TIMEOUT: Duration = Duration::from_secs(5);

struct FrameSlot {
    transforms: wgpu::Buffer,
    materials: wgpu::Buffer,
    /// The submission that last read from this slot, if any.
    last_submission: Option<wgpu::SubmissionIndex>,
}

pub struct FrameResourceRing {
    slots: Vec<FrameSlot>,
    transform_count: usize,
    material_count: usize,
}

impl FrameResourceRing {
    /// Creates `frame_count` slots, each primed with the same initial
    /// transform and material content.
    pub fn new(
        device: &wgpu::Device,
        frame_count: u32,
        transforms: &[TransformRaw],
        materials: &[MaterialAttributes],
    ) -> Result<Self, RenderError> {
        if frame_count == 0 {
            return Err(RenderError::Precondition(
                "frame ring needs at least one slot".to_string(),
            ));
        }
        if transforms.is_empty() || materials.is_empty() {
            return Err(RenderError::Precondition(
                "frame ring needs initial transforms and materials".to_string(),
            ));
        }

        let slots = (0..frame_count)
            .map(|slot| {
                let transforms =
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("Transform Buffer Slot {slot}")),
                        contents: bytemuck::cast_slice(transforms),
                        usage: wgpu::BufferUsages::STORAGE
                            | wgpu::BufferUsages::COPY_DST
                            | wgpu::BufferUsages::COPY_SRC,
                    });
                let materials =
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("Material Buffer Slot {slot}")),
                        contents: bytemuck::cast_slice(materials),
                        usage: wgpu::BufferUsages::STORAGE
                            | wgpu::BufferUsages::COPY_DST
                            | wgpu::BufferUsages::COPY_SRC,
                    });
                FrameSlot {
                    transforms,
                    materials,
                    last_submission: None,
                }
            })
            .collect();

        Ok(Self {
            slots,
            transform_count: transforms.len(),
            material_count: materials.len(),
        })
    }

    /// Uploads this frame's content into one slot. Blocks until the slot's
    /// previous submission has retired, then queues both writes.
    pub fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: usize,
        transforms: &[TransformRaw],
        materials: &[MaterialAttributes],
    ) -> Result<(), RenderError> {
        let frame_slot = self.slots.get_mut(slot).ok_or_else(|| {
            RenderError::Precondition(format!(
                "slot {} out of range for a ring of {}",
                slot,
                self.slots.len()
            ))
        })?;
        if transforms.len() != self.transform_count || materials.len() != self.material_count {
            return Err(RenderError::Precondition(format!(
                "write of {}/{} entries into a ring sized {}/{}",
                transforms.len(),
                materials.len(),
                self.transform_count,
                self.material_count
            )));
        }

        if let Some(submission) = frame_slot.last_submission.take() {
            device
                .poll(wgpu::PollType::Wait {
                    submission_index: Some(submission),
                    timeout: Some(FENCE_TIMEOUT),
                })
                .map_err(|e| {
                    RenderError::ResourceCreation(format!(
                        "fence wait for slot {} failed: {:?}",
                        slot, e
                    ))
                })?;
        }

        queue.write_buffer(&frame_slot.transforms, 0, bytemuck::cast_slice(transforms));
        queue.write_buffer(&frame_slot.materials, 0, bytemuck::cast_slice(materials));
        Ok(())
    }

    /// Records the submission that reads from `slot` this frame. The next
    /// write into the slot waits for it.
    pub fn mark_submitted(
        &mut self,
        slot: usize,
        submission: wgpu::SubmissionIndex,
    ) -> Result<(), RenderError> {
        let frame_slot = self.slots.get_mut(slot).ok_or_else(|| {
            RenderError::Precondition(format!(
                "slot {} out of range for a ring of {}",
                slot,
                self.slots.len()
            ))
        })?;
        frame_slot.last_submission = Some(submission);
        Ok(())
    }

    pub fn buffers(&self, slot: usize) -> Result<(&wgpu::Buffer, &wgpu::Buffer), RenderError> {
        let frame_slot = self.slots.get(slot).ok_or_else(|| {
            RenderError::Precondition(format!(
                "slot {} out of range for a ring of {}",
                slot,
                self.slots.len()
            ))
        })?;
        Ok((&frame_slot.transforms, &frame_slot.materials))
    }

    pub fn frame_count(&self) -> usize {
        self.slots.len()
    }

    pub fn transform_count(&self) -> usize {
        self.transform_count
    }

    pub fn material_count(&self) -> usize {
        self.material_count
    }
}
