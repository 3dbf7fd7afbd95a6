//! strata-ngin
//!
//! The runtime core of a small real-time 3D renderer. The crate owns
//! GPU-resident level geometry and per-instance data, keeps N buffered copies
//! of mutable per-frame buffers consistent with the frames the device may
//! still be executing, and submits one instanced draw per (instance, mesh)
//! pair of the active level each frame. Levels are selected through a keyed
//! registry and can be swapped at runtime, rebuilding every content-sized
//! GPU resource under an explicit device wait.
//!
//! High-level modules
//! - `camera`: view/projection matrices for the per-frame scene constants
//! - `context`: central GPU and window context that owns device/queue/surface
//! - `data_structures`: scene content model and the transform compositor
//! - `error`: the crate-wide error taxonomy
//! - `flow`: the application loop (one update pass, one render pass per tick)
//! - `levels`: keyed level registry, content loading and resource rebuilds
//! - `pipelines`: definition of the level render pipeline and its shader
//! - `render`: draw-list construction and per-frame command submission
//! - `resources`: geometry store, buffered frame ring and descriptor table

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod levels;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;
pub use winit::event::WindowEvent;
pub use winit::keyboard::KeyCode;
