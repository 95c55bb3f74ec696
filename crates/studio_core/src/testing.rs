//! Test double for the physics collaborator.
//!
//! Objects are spheres (radius 0 makes them points). Line traces are
//! blocked by non-excluded objects and by standalone blocker spheres, so
//! tests can stage occlusion without a physics engine.

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

use crate::constraint_link::JointKey;
use crate::object::ObjectId;
use crate::spatial::{ConstraintBackend, SpatialQuery, TraceHit};

#[derive(Default)]
pub struct MockPhysics {
    pub positions: HashMap<ObjectId, Vec3>,
    pub rotations: HashMap<ObjectId, Quat>,
    /// Collision radius shared by every mock object.
    pub object_radius: f32,
    /// Non-object spheres that block line traces (walls).
    pub blockers: Vec<(Vec3, f32)>,
    pub bound: Vec<(ObjectId, ObjectId, Vec3, JointKey)>,
    pub unbound: Vec<JointKey>,
    pub held: HashSet<ObjectId>,
    pub held_targets: HashMap<ObjectId, (Vec3, Quat)>,
    pub velocities: HashMap<ObjectId, (Vec3, Vec3)>,
    pub restored_velocities: Vec<(ObjectId, Vec3, Vec3)>,
    next_joint: u64,
}

impl MockPhysics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: ObjectId, position: Vec3) {
        self.positions.insert(object, position);
        self.rotations.insert(object, Quat::IDENTITY);
    }

    /// Distance from segment [from, to] to `center`, and whether the
    /// closest approach lies within the segment.
    fn segment_distance(from: Vec3, to: Vec3, center: Vec3) -> f32 {
        let dir = to - from;
        let len_sq = dir.length_squared();
        if len_sq < 1e-12 {
            return from.distance(center);
        }
        let t = ((center - from).dot(dir) / len_sq).clamp(0.0, 1.0);
        (from + dir * t).distance(center)
    }
}

impl SpatialQuery for MockPhysics {
    fn sweep_overlap(&self, origin: Vec3, radius: f32) -> Vec<ObjectId> {
        let mut hits: Vec<ObjectId> = self
            .positions
            .iter()
            .filter(|(_, &pos)| pos.distance(origin) <= radius + self.object_radius)
            .map(|(&id, _)| id)
            .collect();
        hits.sort();
        hits
    }

    fn line_trace(&self, from: Vec3, to: Vec3, exclude: &[ObjectId]) -> Option<TraceHit> {
        let mut best: Option<(f32, TraceHit)> = None;

        for (&id, &pos) in &self.positions {
            if exclude.contains(&id) || self.object_radius <= 0.0 {
                continue;
            }
            if Self::segment_distance(from, to, pos) <= self.object_radius {
                let t = (pos - from).dot((to - from).normalize_or_zero());
                if best.as_ref().map_or(true, |(bt, _)| t < *bt) {
                    best = Some((
                        t,
                        TraceHit {
                            object: Some(id),
                            point: pos,
                        },
                    ));
                }
            }
        }
        for &(center, radius) in &self.blockers {
            if Self::segment_distance(from, to, center) <= radius {
                let t = (center - from).dot((to - from).normalize_or_zero());
                if best.as_ref().map_or(true, |(bt, _)| t < *bt) {
                    best = Some((
                        t,
                        TraceHit {
                            object: None,
                            point: center,
                        },
                    ));
                }
            }
        }
        best.map(|(_, hit)| hit)
    }

    fn sweep_sphere(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        radius: f32,
    ) -> Option<TraceHit> {
        let dir = direction.normalize_or_zero();
        let mut best: Option<(f32, ObjectId)> = None;
        for (&id, &pos) in &self.positions {
            let t = (pos - origin).dot(dir);
            if t < 0.0 || t > max_distance {
                continue;
            }
            let closest = origin + dir * t;
            if closest.distance(pos) <= radius + self.object_radius
                && best.map_or(true, |(bt, _)| t < bt)
            {
                best = Some((t, id));
            }
        }
        best.map(|(_, id)| TraceHit {
            object: Some(id),
            point: self.positions[&id],
        })
    }

    fn closest_point_on_object(&self, object: ObjectId, reference: Vec3) -> Option<Vec3> {
        let center = *self.positions.get(&object)?;
        let offset = reference - center;
        if offset.length() <= self.object_radius {
            return Some(reference);
        }
        Some(center + offset.normalize_or_zero() * self.object_radius)
    }

    fn object_pose(&self, object: ObjectId) -> Option<(Vec3, Quat)> {
        let pos = *self.positions.get(&object)?;
        let rot = self.rotations.get(&object).copied().unwrap_or(Quat::IDENTITY);
        Some((pos, rot))
    }
}

impl ConstraintBackend for MockPhysics {
    fn bind(&mut self, a: ObjectId, b: ObjectId, anchor_point: Vec3) -> Option<JointKey> {
        let key = JointKey(self.next_joint);
        self.next_joint += 1;
        self.bound.push((a, b, anchor_point, key));
        Some(key)
    }

    fn unbind(&mut self, joint: JointKey) {
        self.unbound.push(joint);
    }

    fn begin_hold(&mut self, object: ObjectId) {
        self.held.insert(object);
    }

    fn set_held_target(&mut self, object: ObjectId, position: Vec3, rotation: Quat) {
        self.held_targets.insert(object, (position, rotation));
    }

    fn end_hold(&mut self, object: ObjectId) {
        self.held.remove(&object);
    }

    fn place_object(&mut self, object: ObjectId, position: Vec3) {
        self.positions.insert(object, position);
    }

    fn velocity(&self, object: ObjectId) -> Option<(Vec3, Vec3)> {
        self.positions.get(&object)?;
        Some(
            self.velocities
                .get(&object)
                .copied()
                .unwrap_or((Vec3::ZERO, Vec3::ZERO)),
        )
    }

    fn set_velocity(&mut self, object: ObjectId, linear: Vec3, angular: Vec3) {
        self.restored_velocities.push((object, linear, angular));
        self.velocities.insert(object, (linear, angular));
    }
}
