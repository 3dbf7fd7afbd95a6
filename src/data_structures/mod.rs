//! CPU-side content model: the shared scene description that levels load,
//! the transform compositor that animates it, and depth texture helpers.

pub mod compositor;
pub mod scene;
pub mod texture;
