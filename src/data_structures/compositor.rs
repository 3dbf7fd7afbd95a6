//! Hierarchical transform composition.
//!
//! Scene objects link transforms into a forest via parent indices. The
//! compositor validates that forest at load time, then every frame spins the
//! objects that ask for it and rebuilds world transforms so that a child's
//! world transform is its parent's world transform times its own local one.
//! Parents are always composed before their children regardless of authoring
//! order, so arbitrarily deep chains resolve within a single pass.

use std::time::Duration;

use cgmath::{Deg, Matrix4};

use crate::data_structures::scene::{ObjectRole, SceneObject, SceneSource, TransformRaw};
use crate::error::RenderError;

/// Returns object indices in parents-before-children order, or fails if the
/// parent links are not a forest. `transform_count` bounds both the owned
/// transform indices and the parent references.
pub fn processing_order(
    objects: &[SceneObject],
    transform_count: usize,
) -> Result<Vec<usize>, RenderError> {
    // Which object owns which transform slot; parents are named by transform
    // index, not object index.
    let mut owner = vec![None; transform_count];
    for (i, object) in objects.iter().enumerate() {
        let slot = object.transform_index as usize;
        if slot >= transform_count {
            return Err(RenderError::InvalidSceneGraph(format!(
                "object {} owns transform {} but only {} exist",
                i, object.transform_index, transform_count
            )));
        }
        if let Some(prev) = owner[slot] {
            return Err(RenderError::InvalidSceneGraph(format!(
                "objects {} and {} both own transform {}",
                prev, i, slot
            )));
        }
        owner[slot] = Some(i);
    }

    // 0 unvisited, 1 on the current chain, 2 done.
    let mut color = vec![0u8; objects.len()];
    let mut order = Vec::with_capacity(objects.len());

    fn visit(
        i: usize,
        objects: &[SceneObject],
        owner: &[Option<usize>],
        color: &mut [u8],
        order: &mut Vec<usize>,
    ) -> Result<(), RenderError> {
        if color[i] == 2 {
            return Ok(());
        }
        if color[i] == 1 {
            return Err(RenderError::InvalidSceneGraph(format!(
                "object {} is part of a parent cycle",
                i
            )));
        }
        color[i] = 1;
        if let Some(parent_slot) = objects[i].parent {
            if parent_slot == objects[i].transform_index {
                return Err(RenderError::InvalidSceneGraph(format!(
                    "object {} is its own parent",
                    i
                )));
            }
            let parent = owner
                .get(parent_slot as usize)
                .copied()
                .flatten()
                .ok_or_else(|| {
                    RenderError::InvalidSceneGraph(format!(
                        "object {} links to transform {} which no object owns",
                        i, parent_slot
                    ))
                })?;
            visit(parent, objects, owner, color, order)?;
        }
        color[i] = 2;
        order.push(i);
        Ok(())
    }

    for i in 0..objects.len() {
        visit(i, objects, &owner, &mut color, &mut order)?;
    }
    Ok(order)
}

/// Owns the local and world transform pools of the active level and rebuilds
/// the world pool once per frame.
pub struct TransformCompositor {
    locals: Vec<Matrix4<f32>>,
    worlds: Vec<Matrix4<f32>>,
    /// (child transform, parent transform) pairs in parents-first order.
    links: Vec<(usize, usize)>,
    /// (transform, degrees per second) for every spinner object.
    spinners: Vec<(usize, f32)>,
}

impl TransformCompositor {
    /// Fails with `InvalidSceneGraph` when the parent links are malformed.
    pub fn new(source: &SceneSource) -> Result<Self, RenderError> {
        let order = processing_order(&source.objects, source.transforms.len())?;

        let mut links = Vec::new();
        for &i in &order {
            let object = &source.objects[i];
            if let Some(parent) = object.parent {
                links.push((object.transform_index as usize, parent as usize));
            }
        }

        let spinners = source
            .objects
            .iter()
            .filter_map(|object| match object.role {
                Some(ObjectRole::Spinner { degrees_per_second }) => {
                    Some((object.transform_index as usize, degrees_per_second))
                }
                None => None,
            })
            .collect();

        Ok(Self {
            locals: source.transforms.clone(),
            worlds: source.transforms.clone(),
            links,
            spinners,
        })
    }

    /// Applies one frame of animation and recomposes world transforms.
    /// Spinners accumulate into their local transform so rotation carries
    /// over between frames; the world pool is rebuilt from scratch.
    pub fn advance(&mut self, dt: Duration) {
        let dt = dt.as_secs_f32();
        for &(slot, degrees_per_second) in &self.spinners {
            self.locals[slot] =
                self.locals[slot] * Matrix4::from_angle_y(Deg(degrees_per_second * dt));
        }

        self.worlds.copy_from_slice(&self.locals);
        for &(child, parent) in &self.links {
            self.worlds[child] = self.worlds[parent] * self.locals[child];
        }
    }

    pub fn world_transforms(&self) -> &[Matrix4<f32>] {
        &self.worlds
    }

    pub fn to_raw(&self) -> Vec<TransformRaw> {
        self.worlds.iter().map(|&m| m.into()).collect()
    }

    pub fn transform_count(&self) -> usize {
        self.worlds.len()
    }
}
