//! Rapier-backed physics collaborator for the fusion core.
//!
//! `PhysicsState` owns the full rapier world and implements the core's
//! [`SpatialQuery`] and [`ConstraintBackend`] traits: sphere overlap and
//! sweep queries, line-of-sight rays, closest-point projection, fully
//! locked fixed joints with pair collision disabled, and the
//! physics-handle style drive for held bodies.

use std::collections::HashMap;

use bevy::prelude::*;
use rapier3d::parry::query::PointQuery;
use rapier3d::prelude as rapier;
use rapier::nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};

use studio_core::{ConstraintBackend, JointKey, ObjectId, SpatialQuery, TraceHit};

pub mod bridge;

pub use bridge::{
    spawn_moveable, BuildSystemPlugin, FusableHighlight, GrabView, MoveableIndex, MoveableLink,
    RigidBodyLink, StandingOn,
};

/// Velocity gain steering a held body toward its target position.
const HOLD_LINEAR_STIFFNESS: f32 = 10.0;
/// Angular velocity gain steering a held body toward its target rotation.
const HOLD_ANGULAR_STIFFNESS: f32 = 6.0;
/// Damping applied to a body while it is held.
const HOLD_DAMPING: f32 = 5.0;

/// Saved body parameters for the duration of a hold.
#[derive(Debug, Clone, Copy)]
struct HeldBodyState {
    gravity_scale: f32,
    linear_damping: f32,
    angular_damping: f32,
}

/// The rapier physics world plus the object/body bookkeeping the fusion
/// core queries through its collaborator traits.
#[derive(Resource)]
pub struct PhysicsState {
    pub gravity: Vector3<f32>,
    pub integration_parameters: rapier::IntegrationParameters,
    pub physics_pipeline: rapier::PhysicsPipeline,
    pub island_manager: rapier::IslandManager,
    pub broad_phase: rapier::DefaultBroadPhase,
    pub narrow_phase: rapier::NarrowPhase,
    pub rigid_body_set: rapier::RigidBodySet,
    pub collider_set: rapier::ColliderSet,
    pub impulse_joint_set: rapier::ImpulseJointSet,
    pub multibody_joint_set: rapier::MultibodyJointSet,
    pub ccd_solver: rapier::CCDSolver,
    pub query_pipeline: rapier::QueryPipeline,

    object_to_body: HashMap<ObjectId, rapier::RigidBodyHandle>,
    body_to_object: HashMap<rapier::RigidBodyHandle, ObjectId>,
    joints: HashMap<JointKey, rapier::ImpulseJointHandle>,
    next_joint_key: u64,
    held: HashMap<ObjectId, HeldBodyState>,
}

impl PhysicsState {
    pub fn new() -> Self {
        Self {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            integration_parameters: rapier::IntegrationParameters::default(),
            physics_pipeline: rapier::PhysicsPipeline::new(),
            island_manager: rapier::IslandManager::new(),
            broad_phase: rapier::DefaultBroadPhase::new(),
            narrow_phase: rapier::NarrowPhase::new(),
            rigid_body_set: rapier::RigidBodySet::new(),
            collider_set: rapier::ColliderSet::new(),
            impulse_joint_set: rapier::ImpulseJointSet::new(),
            multibody_joint_set: rapier::MultibodyJointSet::new(),
            ccd_solver: rapier::CCDSolver::new(),
            query_pipeline: rapier::QueryPipeline::new(),
            object_to_body: HashMap::new(),
            body_to_object: HashMap::new(),
            joints: HashMap::new(),
            next_joint_key: 0,
            held: HashMap::new(),
        }
    }

    /// Step the simulation by `dt` seconds and refresh the query pipeline.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Rebuild the query acceleration structure. Needed after inserting
    /// bodies before any step has run.
    pub fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Insert a dynamic cuboid body registered as a moveable object.
    pub fn register_moveable(
        &mut self,
        object: ObjectId,
        position: Vec3,
        rotation: Quat,
        half_extents: Vec3,
    ) -> rapier::RigidBodyHandle {
        let body = rapier::RigidBodyBuilder::dynamic().position(Isometry3::from_parts(
            Translation3::new(position.x, position.y, position.z),
            to_unit_quaternion(rotation),
        ));
        let handle = self.rigid_body_set.insert(body);
        let collider =
            rapier::ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z);
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        self.object_to_body.insert(object, handle);
        self.body_to_object.insert(handle, object);
        handle
    }

    /// Insert a fixed cuboid (ground, walls). Static geometry blocks line
    /// traces but is never grabbable.
    pub fn add_static_box(&mut self, position: Vec3, half_extents: Vec3) -> rapier::RigidBodyHandle {
        let body = rapier::RigidBodyBuilder::fixed().translation(Vector3::new(
            position.x, position.y, position.z,
        ));
        let handle = self.rigid_body_set.insert(body);
        let collider =
            rapier::ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z);
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        handle
    }

    pub fn body_of(&self, object: ObjectId) -> Option<rapier::RigidBodyHandle> {
        self.object_to_body.get(&object).copied()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn collider_object(&self, collider: rapier::ColliderHandle) -> Option<ObjectId> {
        let parent = self.collider_set.get(collider)?.parent()?;
        self.body_to_object.get(&parent).copied()
    }
}

impl Default for PhysicsState {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialQuery for PhysicsState {
    fn sweep_overlap(&self, origin: Vec3, radius: f32) -> Vec<ObjectId> {
        let shape = rapier::Ball::new(radius);
        let shape_pos = Isometry3::from_parts(
            Translation3::new(origin.x, origin.y, origin.z),
            UnitQuaternion::identity(),
        );
        let mut out = Vec::new();
        self.query_pipeline.intersections_with_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &shape_pos,
            &shape,
            rapier::QueryFilter::default(),
            |handle| {
                if let Some(object) = self.collider_object(handle) {
                    if !out.contains(&object) {
                        out.push(object);
                    }
                }
                true
            },
        );
        out
    }

    fn line_trace(&self, from: Vec3, to: Vec3, exclude: &[ObjectId]) -> Option<TraceHit> {
        let dir = to - from;
        let len = dir.length();
        if len <= 1.0e-6 {
            return None;
        }
        let ray = rapier::Ray::new(to_point(from), to_vector(dir / len));
        let pred = |handle: rapier::ColliderHandle, _: &rapier::Collider| match self
            .collider_object(handle)
        {
            Some(object) => !exclude.contains(&object),
            None => true,
        };
        let filter = rapier::QueryFilter::default().predicate(&pred);

        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                len,
                true,
                filter,
            )
            .map(|(handle, toi)| TraceHit {
                object: self.collider_object(handle),
                point: point_to_vec3(&ray.point_at(toi)),
            })
    }

    fn sweep_sphere(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        radius: f32,
    ) -> Option<TraceHit> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        let shape = rapier::Ball::new(radius);
        let shape_pos = Isometry3::from_parts(
            Translation3::new(origin.x, origin.y, origin.z),
            UnitQuaternion::identity(),
        );
        let options = rapier3d::parry::query::ShapeCastOptions {
            max_time_of_impact: max_distance,
            target_distance: 0.0,
            stop_at_penetration: true,
            compute_impact_geometry_on_penetration: true,
        };
        // Only moveable objects are grabbable.
        let pred = |handle: rapier::ColliderHandle, _: &rapier::Collider| {
            self.collider_object(handle).is_some()
        };
        let filter = rapier::QueryFilter::default().predicate(&pred);

        self.query_pipeline
            .cast_shape(
                &self.rigid_body_set,
                &self.collider_set,
                &shape_pos,
                &to_vector(dir),
                &shape,
                options,
                filter,
            )
            .map(|(handle, hit)| TraceHit {
                object: self.collider_object(handle),
                point: point_to_vec3(&hit.witness1),
            })
    }

    fn closest_point_on_object(&self, object: ObjectId, reference: Vec3) -> Option<Vec3> {
        let handle = self.body_of(object)?;
        let body = self.rigid_body_set.get(handle)?;
        let collider_handle = *body.colliders().first()?;
        let collider = self.collider_set.get(collider_handle)?;
        let projection =
            collider
                .shape()
                .project_point(collider.position(), &to_point(reference), true);
        Some(point_to_vec3(&projection.point))
    }

    fn object_pose(&self, object: ObjectId) -> Option<(Vec3, Quat)> {
        let body = self.rigid_body_set.get(self.body_of(object)?)?;
        let pos = body.translation();
        let rot = body.rotation();
        Some((
            Vec3::new(pos.x, pos.y, pos.z),
            Quat::from_xyzw(rot.i, rot.j, rot.k, rot.w),
        ))
    }
}

impl ConstraintBackend for PhysicsState {
    fn bind(&mut self, a: ObjectId, b: ObjectId, anchor_point: Vec3) -> Option<JointKey> {
        let handle_a = self.body_of(a)?;
        let handle_b = self.body_of(b)?;
        let pose_a = *self.rigid_body_set.get(handle_a)?.position();
        let pose_b = *self.rigid_body_set.get(handle_b)?.position();

        // Lock the current relative pose: both local frames map onto the
        // same world frame at the anchor point.
        let world_frame = Isometry3::from_parts(
            Translation3::new(anchor_point.x, anchor_point.y, anchor_point.z),
            UnitQuaternion::identity(),
        );
        let joint = rapier::FixedJointBuilder::new()
            .local_frame1(pose_a.inv_mul(&world_frame))
            .local_frame2(pose_b.inv_mul(&world_frame))
            .contacts_enabled(false);

        let handle = self
            .impulse_joint_set
            .insert(handle_a, handle_b, joint, true);
        let key = JointKey(self.next_joint_key);
        self.next_joint_key += 1;
        self.joints.insert(key, handle);
        Some(key)
    }

    fn unbind(&mut self, joint: JointKey) {
        if let Some(handle) = self.joints.remove(&joint) {
            // Removing the joint also re-enables contacts between the pair.
            self.impulse_joint_set.remove(handle, true);
        }
    }

    fn begin_hold(&mut self, object: ObjectId) {
        let Some(handle) = self.body_of(object) else {
            return;
        };
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return;
        };
        self.held.insert(
            object,
            HeldBodyState {
                gravity_scale: body.gravity_scale(),
                linear_damping: body.linear_damping(),
                angular_damping: body.angular_damping(),
            },
        );
        body.set_gravity_scale(0.0, true);
        body.set_linear_damping(HOLD_DAMPING);
        body.set_angular_damping(HOLD_DAMPING);
        body.wake_up(true);
    }

    fn set_held_target(&mut self, object: ObjectId, position: Vec3, rotation: Quat) {
        let Some(handle) = self.body_of(object) else {
            return;
        };
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return;
        };
        let linvel = (to_vector(position) - body.translation()) * HOLD_LINEAR_STIFFNESS;
        body.set_linvel(linvel, true);

        let delta = to_unit_quaternion(rotation) * body.rotation().inverse();
        body.set_angvel(delta.scaled_axis() * HOLD_ANGULAR_STIFFNESS, true);
    }

    fn end_hold(&mut self, object: ObjectId) {
        let Some(saved) = self.held.remove(&object) else {
            return;
        };
        let Some(handle) = self.body_of(object) else {
            return;
        };
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_gravity_scale(saved.gravity_scale, true);
            body.set_linear_damping(saved.linear_damping);
            body.set_angular_damping(saved.angular_damping);
        }
    }

    fn place_object(&mut self, object: ObjectId, position: Vec3) {
        let Some(handle) = self.body_of(object) else {
            return;
        };
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            // The animator owns the transform while fusing; the body must
            // not fight the placement with accumulated velocity.
            body.set_translation(to_vector(position), true);
            body.set_linvel(Vector3::zeros(), true);
            body.set_angvel(Vector3::zeros(), true);
        }
    }

    fn velocity(&self, object: ObjectId) -> Option<(Vec3, Vec3)> {
        let body = self.rigid_body_set.get(self.body_of(object)?)?;
        let lin = body.linvel();
        let ang = body.angvel();
        Some((
            Vec3::new(lin.x, lin.y, lin.z),
            Vec3::new(ang.x, ang.y, ang.z),
        ))
    }

    fn set_velocity(&mut self, object: ObjectId, linear: Vec3, angular: Vec3) {
        let Some(handle) = self.body_of(object) else {
            return;
        };
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_linvel(to_vector(linear), true);
            body.set_angvel(to_vector(angular), true);
        }
    }
}

fn to_vector(v: Vec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

fn to_point(v: Vec3) -> Point3<f32> {
    Point3::new(v.x, v.y, v.z)
}

fn point_to_vec3(p: &Point3<f32>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

fn to_unit_quaternion(q: Quat) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}
