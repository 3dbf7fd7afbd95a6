//! Crate-wide error taxonomy.
//!
//! Failures fall into two families: content failures (`SceneLoad`,
//! `InvalidSceneGraph`) that leave the currently active level untouched and
//! are reported without tearing anything down, and runtime failures
//! (`ResourceCreation`, `Precondition`, `NotInitialized`) that indicate the
//! renderer itself has been misused or the device gave up.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// The device refused to create a resource, or a fence/idle wait failed.
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),

    /// Level content could not be produced or failed validation.
    #[error("scene load failed: {0}")]
    SceneLoad(String),

    /// Parent links between scene objects do not form a forest.
    #[error("invalid scene graph: {0}")]
    InvalidSceneGraph(String),

    /// A caller violated an API precondition (bad slot index, count mismatch).
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// An operation needs state that has not been set up yet.
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),
}

impl RenderError {
    /// Content errors are recoverable: a failed load or swap leaves the
    /// previously active level fully intact and drawable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::SceneLoad(_) | RenderError::InvalidSceneGraph(_)
        )
    }
}
