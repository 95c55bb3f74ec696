//! Contracts the fusion core consumes from the physics collaborator.
//!
//! The core decides when and to what a constraint should exist; geometric
//! queries and joint bookkeeping are performed behind these traits. All
//! calls are synchronous and never suspend across frames.

use bevy::prelude::*;

use crate::constraint_link::JointKey;
use crate::object::ObjectId;

/// The grabbing agent's viewpoint for one frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewPose {
    pub origin: Vec3,
    /// Unit view direction.
    pub forward: Vec3,
}

impl ViewPose {
    pub fn new(origin: Vec3, forward: Vec3) -> Self {
        Self {
            origin,
            forward: forward.normalize_or_zero(),
        }
    }
}

/// Result of a ray or sweep query.
#[derive(Debug, Clone, Copy)]
pub struct TraceHit {
    /// The moveable object that was hit, if the hit collider belongs to one.
    pub object: Option<ObjectId>,
    pub point: Vec3,
}

/// Read-only geometric queries against the physics scene.
pub trait SpatialQuery {
    /// Moveable objects whose collision volume overlaps a sphere.
    fn sweep_overlap(&self, origin: Vec3, radius: f32) -> Vec<ObjectId>;

    /// First blocking hit along a segment. Objects in `exclude` never
    /// block; `None` means a clear line of sight.
    fn line_trace(&self, from: Vec3, to: Vec3, exclude: &[ObjectId]) -> Option<TraceHit>;

    /// Sphere sweep along a ray, hitting moveable objects only. Used for
    /// grab reach checks.
    fn sweep_sphere(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        radius: f32,
    ) -> Option<TraceHit>;

    /// Closest point on the object's own collision volume to `reference`.
    fn closest_point_on_object(&self, object: ObjectId, reference: Vec3) -> Option<Vec3>;

    /// Current world pose of the object's body.
    fn object_pose(&self, object: ObjectId) -> Option<(Vec3, Quat)>;
}

/// Joint creation/destruction and motion control on the physics scene.
pub trait ConstraintBackend {
    /// Create a fully locked joint between `a` and `b`, anchored at the
    /// given world point, with collision between the pair disabled for the
    /// joint's lifetime. `a` is the anchor side chosen by the core.
    fn bind(&mut self, a: ObjectId, b: ObjectId, anchor_point: Vec3) -> Option<JointKey>;

    /// Destroy a joint, restoring independent collision on both endpoints.
    fn unbind(&mut self, joint: JointKey);

    /// Take hold of an object: the body keeps simulating but is steered
    /// toward the target pose fed each step.
    fn begin_hold(&mut self, object: ObjectId);

    fn set_held_target(&mut self, object: ObjectId, position: Vec3, rotation: Quat);

    /// Release a held object back to free simulation.
    fn end_hold(&mut self, object: ObjectId);

    /// Place an object's origin directly. The fusion animator owns the
    /// transform while a fuse is approaching.
    fn place_object(&mut self, object: ObjectId, position: Vec3);

    /// Current (linear, angular) velocity.
    fn velocity(&self, object: ObjectId) -> Option<(Vec3, Vec3)>;

    fn set_velocity(&mut self, object: ObjectId, linear: Vec3, angular: Vec3);
}
