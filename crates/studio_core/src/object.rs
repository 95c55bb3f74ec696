//! Moveable object records and the arena that owns them.

use bevy::prelude::*;

use crate::snap_point::SnapPointSet;

/// Stable handle to a moveable object. Objects are registered at scene
/// setup and live until whole-scene teardown, so the index is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where the rigid joint anchors when this object's group commits a fusion.
///
/// Replaces per-archetype subclassing: beams and boards pick the policy at
/// registration instead of overriding the fuse routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPolicy {
    /// Anchor on the held-group member closest to the candidate, so chains
    /// of pieces each anchor locally.
    ClosestFusedMember,
    /// Anchor on the originally grabbed object.
    GrabbedRoot,
}

/// Per-object state tracked by the fusion core.
#[derive(Debug)]
pub struct ObjectData {
    pub snap_points: SnapPointSet,
    pub anchor_policy: AnchorPolicy,
    /// Whether this object currently carries the "fusable" highlight.
    pub highlighted: bool,
    /// Linear/angular velocity captured last step, restored on fuse commit
    /// so the join never imparts the collision impulse.
    pub cached_linvel: Vec3,
    pub cached_angvel: Vec3,
}

impl ObjectData {
    pub fn new(snap_points: SnapPointSet, anchor_policy: AnchorPolicy) -> Self {
        Self {
            snap_points,
            anchor_policy,
            highlighted: false,
            cached_linvel: Vec3::ZERO,
            cached_angvel: Vec3::ZERO,
        }
    }
}

/// Dense arena of every registered moveable object.
#[derive(Debug, Default)]
pub struct ObjectArena {
    objects: Vec<ObjectData>,
}

impl ObjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: ObjectData) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(data);
        id
    }

    pub fn get(&self, id: ObjectId) -> &ObjectData {
        &self.objects[id.index()]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut ObjectData {
        &mut self.objects[id.index()]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> {
        (0..self.objects.len() as u32).map(ObjectId)
    }
}
