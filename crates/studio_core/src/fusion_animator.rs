//! Approach animation that closes the gap before a fuse commits.
//!
//! Releasing with a live candidate does not snap the pieces together
//! instantly. The animator recomputes the two closing points every step
//! (both bodies keep moving) and eases the released piece toward the
//! candidate until the residual distance falls inside the fuse tolerance.

use bevy::prelude::*;

use crate::config::FusionConfig;
use crate::object::{ObjectArena, ObjectId};
use crate::snap_point::{closest_point_to_reference, SnapPoint};
use crate::spatial::{ConstraintBackend, SpatialQuery};

/// The two world-space points being driven together.
#[derive(Debug, Clone, Copy)]
pub struct FusePoints {
    /// Point on the held piece (surface or snap point).
    pub held_point: Vec3,
    /// Point on the candidate (surface or snap point).
    pub other_point: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct ApproachState {
    held: ObjectId,
    other: ObjectId,
    grab_root: ObjectId,
}

/// Outcome of advancing the animator by one step.
#[derive(Debug, Clone, Copy)]
pub enum AnimatorStep {
    Idle,
    Approaching {
        distance: f32,
    },
    /// Tolerance reached; the caller binds the joint and merges groups.
    Commit {
        held_member: ObjectId,
        other: ObjectId,
        grab_root: ObjectId,
        anchor_point: Vec3,
    },
}

/// Idle -> Approaching -> Committed state machine. Plain data; advanced by
/// being re-invoked once per simulation step.
#[derive(Debug, Default)]
pub struct FuseAnimator {
    state: Option<ApproachState>,
}

impl FuseAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Enter the approaching state. Returns false (and stays idle) when the
    /// closing points cannot be resolved.
    pub fn begin(
        &mut self,
        held: ObjectId,
        other: ObjectId,
        grab_root: ObjectId,
        objects: &ObjectArena,
        physics: &impl SpatialQuery,
        config: &FusionConfig,
    ) -> bool {
        if compute_fuse_points(held, other, objects, physics, config.snap_search_radius).is_none()
        {
            return false;
        }
        self.state = Some(ApproachState {
            held,
            other,
            grab_root,
        });
        true
    }

    /// Abandon any pending approach. No partial joint is ever left behind.
    pub fn cancel(&mut self) {
        self.state = None;
    }

    /// Advance one step: refresh the closing points, ease the held piece
    /// toward the candidate, and report a commit once within tolerance.
    pub fn step<P: SpatialQuery + ConstraintBackend>(
        &mut self,
        dt: f32,
        objects: &ObjectArena,
        physics: &mut P,
        config: &FusionConfig,
    ) -> AnimatorStep {
        let Some(state) = self.state else {
            return AnimatorStep::Idle;
        };

        let points = compute_fuse_points(
            state.held,
            state.other,
            objects,
            physics,
            config.snap_search_radius,
        );
        let (Some(points), Some((held_pos, _))) = (points, physics.object_pose(state.held))
        else {
            // Candidate vanished mid-approach: abandon cleanly.
            self.state = None;
            return AnimatorStep::Idle;
        };

        let distance = points.held_point.distance(points.other_point);

        // Offset from the held piece's closing point back to its origin;
        // the origin target keeps the two points coincident on arrival.
        let offset = points.held_point - held_pos;
        let target = points.other_point - offset;

        let alpha = 1.0 - (-config.interp_speed * dt).exp();
        physics.place_object(state.held, held_pos.lerp(target, alpha));

        if distance <= config.fuse_tolerance {
            self.state = None;
            AnimatorStep::Commit {
                held_member: state.held,
                other: state.other,
                grab_root: state.grab_root,
                anchor_point: points.other_point,
            }
        } else {
            AnimatorStep::Approaching { distance }
        }
    }
}

/// Two-pass closest-point refinement: anchor on the candidate side first,
/// then resolve the held side against that anchor. A snap point within the
/// search radius of either raw point takes over as the true target,
/// provided both sides' types accept each other.
pub fn compute_fuse_points(
    held: ObjectId,
    other: ObjectId,
    objects: &ObjectArena,
    physics: &impl SpatialQuery,
    snap_search_radius: f32,
) -> Option<FusePoints> {
    let (held_pos, held_rot) = physics.object_pose(held)?;
    let (other_pos, other_rot) = physics.object_pose(other)?;

    let other_raw = physics.closest_point_on_object(other, held_pos)?;
    let held_raw = physics.closest_point_on_object(held, other_raw)?;

    let other_snaps = objects.get(other).snap_points.points_within_radius(
        other_pos,
        other_rot,
        other_raw,
        snap_search_radius,
    );
    let other_snap = closest_point_to_reference(&other_snaps, other_pos, other_rot, other_raw);
    let other_point = other_snap
        .map(|s| s.world_position(other_pos, other_rot))
        .unwrap_or(other_raw);

    let held_snaps: Vec<&SnapPoint> = objects
        .get(held)
        .snap_points
        .points_within_radius(held_pos, held_rot, held_raw, snap_search_radius)
        .into_iter()
        .filter(|p| match other_snap {
            Some(partner) => p.accepts(partner.snap_type) && partner.accepts(p.snap_type),
            None => true,
        })
        .collect();
    let held_point = closest_point_to_reference(&held_snaps, held_pos, held_rot, held_raw)
        .map(|s| s.world_position(held_pos, held_rot))
        .unwrap_or(held_raw);

    Some(FusePoints {
        held_point,
        other_point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{AnchorPolicy, ObjectData};
    use crate::snap_point::{SnapPointSet, SnapType};
    use crate::testing::MockPhysics;

    const DT: f32 = 1.0 / 60.0;

    fn arena_of(count: usize) -> ObjectArena {
        let mut arena = ObjectArena::new();
        for _ in 0..count {
            arena.push(ObjectData::new(
                SnapPointSet::empty(),
                AnchorPolicy::ClosestFusedMember,
            ));
        }
        arena
    }

    #[test]
    fn approach_distance_strictly_decreases_and_commits_within_bound() {
        let arena = arena_of(2);
        let held = ObjectId(0);
        let other = ObjectId(1);
        let mut physics = MockPhysics::new();
        physics.add_object(held, Vec3::ZERO);
        physics.add_object(other, Vec3::new(2.0, 0.0, 0.0));

        let config = FusionConfig::default();
        let mut animator = FuseAnimator::new();
        assert!(animator.begin(held, other, held, &arena, &physics, &config));

        // Geometric decay: d_n = d_0 * exp(-speed * dt)^n, so the commit
        // step count is bounded by ln(d0 / tol) / (speed * dt).
        let bound = ((2.0_f32 / config.fuse_tolerance).ln()
            / (config.interp_speed * DT))
            .ceil() as usize
            + 2;

        let mut last_distance = f32::INFINITY;
        let mut committed = None;
        for _ in 0..bound {
            match animator.step(DT, &arena, &mut physics, &config) {
                AnimatorStep::Approaching { distance } => {
                    assert!(distance < last_distance, "distance must shrink every step");
                    last_distance = distance;
                }
                AnimatorStep::Commit {
                    held_member,
                    other: committed_other,
                    anchor_point,
                    ..
                } => {
                    committed = Some((held_member, committed_other, anchor_point));
                    break;
                }
                AnimatorStep::Idle => panic!("animator dropped out mid-approach"),
            }
        }

        let (held_member, committed_other, anchor_point) =
            committed.expect("must commit within the decay bound");
        assert_eq!(held_member, held);
        assert_eq!(committed_other, other);
        assert!(anchor_point.distance(Vec3::new(2.0, 0.0, 0.0)) < 1e-3);
        assert!(!animator.is_active());
    }

    #[test]
    fn snap_point_near_the_closing_point_takes_over_as_target() {
        let mut arena = ObjectArena::new();
        let held = arena.push(ObjectData::new(
            SnapPointSet::empty(),
            AnchorPolicy::ClosestFusedMember,
        ));
        let other = arena.push(ObjectData::new(
            SnapPointSet::new(vec![SnapPoint::new(
                Vec3::new(0.1, 0.0, 0.0),
                SnapType::BeamEnd,
            )]),
            AnchorPolicy::ClosestFusedMember,
        ));

        let mut physics = MockPhysics::new();
        physics.add_object(held, Vec3::ZERO);
        physics.add_object(other, Vec3::new(1.0, 0.0, 0.0));

        let points =
            compute_fuse_points(held, other, &arena, &physics, 0.25).expect("points resolve");
        assert!(points.other_point.distance(Vec3::new(1.1, 0.0, 0.0)) < 1e-6);
    }

    #[test]
    fn incompatible_snap_pairs_fall_back_to_the_raw_point() {
        let mut arena = ObjectArena::new();
        let held = arena.push(ObjectData::new(
            SnapPointSet::new(vec![SnapPoint::new(Vec3::new(-0.1, 0.0, 0.0), SnapType::BoardTop)
                .with_compatible_types(vec![SnapType::BoardTop])]),
            AnchorPolicy::ClosestFusedMember,
        ));
        let other = arena.push(ObjectData::new(
            SnapPointSet::new(vec![SnapPoint::new(
                Vec3::new(0.1, 0.0, 0.0),
                SnapType::BeamEnd,
            )]),
            AnchorPolicy::ClosestFusedMember,
        ));

        let mut physics = MockPhysics::new();
        physics.add_object(held, Vec3::ZERO);
        physics.add_object(other, Vec3::new(1.0, 0.0, 0.0));

        let points = compute_fuse_points(held, other, &arena, &physics, 0.25).unwrap();
        // The candidate side keeps its snap point; the held side's snap
        // point rejects BeamEnd partners, so the raw origin point stays.
        assert!(points.other_point.distance(Vec3::new(1.1, 0.0, 0.0)) < 1e-6);
        assert!(points.held_point.distance(Vec3::ZERO) < 1e-6);
    }

    #[test]
    fn compatible_held_snap_offsets_the_final_resting_pose() {
        let mut arena = ObjectArena::new();
        let held = arena.push(ObjectData::new(
            SnapPointSet::new(vec![SnapPoint::new(
                Vec3::new(-0.1, 0.0, 0.0),
                SnapType::BeamEnd,
            )]),
            AnchorPolicy::ClosestFusedMember,
        ));
        let other = arena.push(ObjectData::new(
            SnapPointSet::new(vec![SnapPoint::new(
                Vec3::new(0.1, 0.0, 0.0),
                SnapType::BeamEnd,
            )]),
            AnchorPolicy::ClosestFusedMember,
        ));

        let mut physics = MockPhysics::new();
        physics.add_object(held, Vec3::new(0.05, 0.0, 0.0));
        physics.add_object(other, Vec3::new(1.0, 0.0, 0.0));

        let points = compute_fuse_points(held, other, &arena, &physics, 0.25).unwrap();
        assert!(points.held_point.distance(Vec3::new(-0.05, 0.0, 0.0)) < 1e-6);
        assert!(points.other_point.distance(Vec3::new(1.1, 0.0, 0.0)) < 1e-6);
    }

    #[test]
    fn losing_the_candidate_abandons_without_commit() {
        let arena = arena_of(2);
        let held = ObjectId(0);
        let other = ObjectId(1);
        let mut physics = MockPhysics::new();
        physics.add_object(held, Vec3::ZERO);
        physics.add_object(other, Vec3::new(1.0, 0.0, 0.0));

        let config = FusionConfig::default();
        let mut animator = FuseAnimator::new();
        assert!(animator.begin(held, other, held, &arena, &physics, &config));

        physics.positions.remove(&other);
        match animator.step(DT, &arena, &mut physics, &config) {
            AnimatorStep::Idle => {}
            step => panic!("expected a clean abandon, got {step:?}"),
        }
        assert!(!animator.is_active());
        assert!(physics.bound.is_empty());
    }

    #[test]
    fn begin_refuses_unresolvable_pairs() {
        let arena = arena_of(2);
        let physics = MockPhysics::new();
        let mut animator = FuseAnimator::new();
        let config = FusionConfig::default();

        assert!(!animator.begin(
            ObjectId(0),
            ObjectId(1),
            ObjectId(0),
            &arena,
            &physics,
            &config
        ));
        assert!(!animator.is_active());
    }
}
