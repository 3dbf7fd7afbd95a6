//! GPU-resident level resources: the immutable geometry store, the buffered
//! ring of per-frame instance buffers and the descriptor table that exposes
//! them to the pipeline.

pub mod descriptors;
pub mod frame_ring;
pub mod geometry;
