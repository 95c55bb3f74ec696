//! Orchestration of the whole fusion subsystem.
//!
//! `FusionWorld` owns the object arena, the group partition, the link
//! graph, the grab controller state and the fuse animator, and drives them
//! once per simulation step against the physics collaborator. Observable
//! state changes are recorded as `FusionEvent`s and drained by the caller;
//! the core itself never logs or draws.

use bevy::prelude::*;

use crate::candidate::{select_fusion_candidate, FusionCandidate};
use crate::config::{FusionConfig, GrabConfig};
use crate::constraint_link::LinkGraph;
use crate::fusion_animator::{AnimatorStep, FuseAnimator};
use crate::fusion_group::FusionGroupTable;
use crate::object::{AnchorPolicy, ObjectArena, ObjectData, ObjectId};
use crate::rotation_snap::snap_rotation;
use crate::snap_point::SnapPointSet;
use crate::spatial::{ConstraintBackend, SpatialQuery, ViewPose};

/// Extension-point notifications recorded by the core. Observers (logging,
/// material mirroring, debug draw) consume these instead of living inline
/// in the fusion logic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionEvent {
    Grabbed { object: ObjectId },
    Released { object: ObjectId },
    CandidateFound { held_member: ObjectId, other: ObjectId },
    CandidateCleared,
    FuseStarted { held_member: ObjectId, other: ObjectId },
    JointCreated { a: ObjectId, b: ObjectId },
    JointDestroyed { a: ObjectId, b: ObjectId },
    GroupsMerged { anchor: ObjectId, other: ObjectId },
    GroupSplit { object: ObjectId },
    HighlightChanged { object: ObjectId, enabled: bool },
}

/// Transient state while an object is grabbed.
#[derive(Debug, Clone, Copy)]
pub struct HeldState {
    pub object: ObjectId,
    pub hold_distance: f32,
    /// Manual rotation offset; baseline rounded to the step on grab.
    pub hold_rotation: Quat,
    /// Held-group member currently closest to a fusion candidate.
    pub nearest_member: Option<ObjectId>,
    pub candidate: Option<FusionCandidate>,
}

#[derive(Resource)]
pub struct FusionWorld {
    objects: ObjectArena,
    groups: FusionGroupTable,
    links: LinkGraph,
    grab_config: GrabConfig,
    fusion_config: FusionConfig,
    held: Option<HeldState>,
    animator: FuseAnimator,
    /// Object whose group currently carries the fusable highlight.
    highlight_anchor: Option<ObjectId>,
    events: Vec<FusionEvent>,
}

impl Default for FusionWorld {
    fn default() -> Self {
        Self::new(GrabConfig::default(), FusionConfig::default())
    }
}

impl FusionWorld {
    pub fn new(grab_config: GrabConfig, fusion_config: FusionConfig) -> Self {
        Self {
            objects: ObjectArena::new(),
            groups: FusionGroupTable::new(),
            links: LinkGraph::new(),
            grab_config,
            fusion_config,
            held: None,
            animator: FuseAnimator::new(),
            highlight_anchor: None,
            events: Vec::new(),
        }
    }

    /// Register a moveable object; it starts in its own singleton group.
    pub fn spawn_object(&mut self, snap_points: SnapPointSet, anchor_policy: AnchorPolicy) -> ObjectId {
        let id = self.objects.push(ObjectData::new(snap_points, anchor_policy));
        self.groups.insert_singleton(id);
        id
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_holding(&self) -> bool {
        self.held.is_some()
    }

    pub fn held_object(&self) -> Option<ObjectId> {
        self.held.as_ref().map(|h| h.object)
    }

    pub fn held_state(&self) -> Option<&HeldState> {
        self.held.as_ref()
    }

    pub fn group_members(&self, object: ObjectId) -> &[ObjectId] {
        self.groups.members_of(object)
    }

    pub fn link_count(&self) -> usize {
        self.links.link_count()
    }

    pub fn highlighted(&self, object: ObjectId) -> bool {
        self.objects.get(object).highlighted
    }

    pub fn grab_config(&self) -> &GrabConfig {
        &self.grab_config
    }

    pub fn fusion_config(&self) -> &FusionConfig {
        &self.fusion_config
    }

    /// Take the events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<FusionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Try to grab whatever the view ray reaches. Silent no-op when nothing
    /// grabbable is in reach, something is already held, or the grabbing
    /// agent stands on a member of the target's fused group.
    pub fn grab<P: SpatialQuery + ConstraintBackend>(
        &mut self,
        view: &ViewPose,
        standing_on: Option<ObjectId>,
        physics: &mut P,
    ) {
        if self.held.is_some() {
            return;
        }
        let Some(hit) = physics.sweep_sphere(
            view.origin,
            view.forward,
            self.grab_config.max_grab_distance,
            self.grab_config.grab_radius,
        ) else {
            return;
        };
        let Some(object) = hit.object else {
            return;
        };
        if let Some(on) = standing_on {
            if self.groups.members_of(object).contains(&on) {
                return;
            }
        }

        // A new grab cycle invalidates any pending approach; the animator
        // is discarded whole so no partial joint can leak.
        self.animator.cancel();
        self.set_highlight_anchor(None);

        let Some((pos, rot)) = physics.object_pose(object) else {
            return;
        };
        let hold_distance = view
            .origin
            .distance(pos)
            .clamp(self.grab_config.min_hold_distance, self.grab_config.max_hold_distance);

        physics.begin_hold(object);
        self.held = Some(HeldState {
            object,
            hold_distance,
            hold_rotation: snap_rotation(rot),
            nearest_member: None,
            candidate: None,
        });
        self.events.push(FusionEvent::Grabbed { object });
    }

    /// Drop the held object. With a live candidate the animator takes over;
    /// otherwise the body simply returns to free simulation.
    pub fn release<P: SpatialQuery + ConstraintBackend>(&mut self, physics: &mut P) {
        let Some(held) = self.held.take() else {
            return;
        };
        physics.end_hold(held.object);
        self.events.push(FusionEvent::Released { object: held.object });

        if let Some(candidate) = held.candidate {
            if self.animator.begin(
                candidate.held_member,
                candidate.other,
                held.object,
                &self.objects,
                physics,
                &self.fusion_config,
            ) {
                self.events.push(FusionEvent::FuseStarted {
                    held_member: candidate.held_member,
                    other: candidate.other,
                });
                // Highlight stays on the candidate group until the commit.
                return;
            }
        }
        self.set_highlight_anchor(None);
    }

    pub fn rotate_left(&mut self) {
        self.rotate_step(Vec3::Y, 1.0);
    }

    pub fn rotate_right(&mut self) {
        self.rotate_step(Vec3::Y, -1.0);
    }

    pub fn rotate_up(&mut self) {
        self.rotate_step(Vec3::X, -1.0);
    }

    pub fn rotate_down(&mut self) {
        self.rotate_step(Vec3::X, 1.0);
    }

    fn rotate_step(&mut self, axis: Vec3, sign: f32) {
        let step = self.grab_config.rotation_step_degrees.to_radians() * sign;
        let Some(held) = &mut self.held else {
            return;
        };
        held.hold_rotation = Quat::from_axis_angle(axis, step) * held.hold_rotation;
    }

    pub fn move_towards(&mut self) {
        self.adjust_hold_distance(-self.grab_config.hold_distance_step);
    }

    pub fn move_away(&mut self) {
        self.adjust_hold_distance(self.grab_config.hold_distance_step);
    }

    fn adjust_hold_distance(&mut self, delta: f32) {
        let min = self.grab_config.min_hold_distance;
        let max = self.grab_config.max_hold_distance;
        let Some(held) = &mut self.held else {
            return;
        };
        held.hold_distance = (held.hold_distance + delta).clamp(min, max);
    }

    /// Shake gesture on the held object: split its whole group.
    pub fn on_shake_detected<P: ConstraintBackend>(&mut self, physics: &mut P) {
        let Some(object) = self.held.as_ref().map(|h| h.object) else {
            return;
        };
        self.split(object, physics);
    }

    /// Tear down every joint touching the object's group and rebuild the
    /// partition from whatever links remain. Splitting a singleton with no
    /// links is a silent no-op.
    pub fn split<P: ConstraintBackend>(&mut self, object: ObjectId, physics: &mut P) {
        let group = self.groups.group_of(object);
        let members = self.groups.members(group).to_vec();
        let touching = self.links.links_touching(&members);
        if members.len() <= 1 && touching.is_empty() {
            return;
        }

        for id in touching {
            if let Some(link) = self.links.remove_link(id) {
                physics.unbind(link.joint);
                self.events.push(FusionEvent::JointDestroyed {
                    a: link.a,
                    b: link.b,
                });
            }
        }

        let former = self.groups.demote_to_singletons(group);
        // Flood-fill the remaining link graph. Today every link of the
        // group is gone and this yields singletons, but a partial
        // disconnect keeps still-connected members grouped.
        for component in self.links.connected_components(&former) {
            if component.len() > 1 {
                self.groups.adopt_component(&component);
            }
        }
        self.groups.debug_assert_consistent();
        self.events.push(FusionEvent::GroupSplit { object });
    }

    /// Advance one simulation step: feed the held target pose, refresh the
    /// fusion candidate, drive a pending approach, and recapture velocity
    /// caches for the next step.
    pub fn update<P: SpatialQuery + ConstraintBackend>(
        &mut self,
        dt: f32,
        view: &ViewPose,
        physics: &mut P,
    ) {
        if let Some(held) = self.held {
            let target = view.origin
                + view.forward * held.hold_distance
                + Vec3::Y * self.grab_config.hold_height_offset;
            physics.set_held_target(held.object, target, held.hold_rotation);

            let members = self.groups.members_of(held.object).to_vec();
            let candidate =
                select_fusion_candidate(&members, physics, self.fusion_config.proximity_radius);

            match (held.candidate, candidate) {
                (Some(previous), Some(current)) if previous.other == current.other => {}
                (None, None) => {}
                (_, Some(current)) => {
                    self.set_highlight_anchor(Some(current.other));
                    self.events.push(FusionEvent::CandidateFound {
                        held_member: current.held_member,
                        other: current.other,
                    });
                }
                (Some(_), None) => {
                    self.set_highlight_anchor(None);
                    self.events.push(FusionEvent::CandidateCleared);
                }
            }

            if let Some(held) = &mut self.held {
                held.nearest_member = candidate.map(|c| c.held_member);
                held.candidate = candidate;
            }
        } else {
            let was_approaching = self.animator.is_active();
            match self.animator.step(dt, &self.objects, physics, &self.fusion_config) {
                AnimatorStep::Commit {
                    held_member,
                    other,
                    grab_root,
                    anchor_point,
                } => self.commit_fuse(held_member, other, grab_root, anchor_point, physics),
                AnimatorStep::Approaching { .. } => {}
                AnimatorStep::Idle => {
                    if was_approaching {
                        // The approach was abandoned; drop its highlight.
                        self.set_highlight_anchor(None);
                    }
                }
            }
        }

        // Recapture last: a commit above must restore the velocities that
        // were current before this step's impact, i.e. the previous cache.
        for index in 0..self.objects.len() {
            let id = ObjectId(index as u32);
            if let Some((linear, angular)) = physics.velocity(id) {
                let data = self.objects.get_mut(id);
                data.cached_linvel = linear;
                data.cached_angvel = angular;
            }
        }
    }

    fn commit_fuse<P: SpatialQuery + ConstraintBackend>(
        &mut self,
        held_member: ObjectId,
        other: ObjectId,
        grab_root: ObjectId,
        anchor_point: Vec3,
        physics: &mut P,
    ) {
        let anchor_object = match self.objects.get(grab_root).anchor_policy {
            AnchorPolicy::ClosestFusedMember => held_member,
            AnchorPolicy::GrabbedRoot => grab_root,
        };
        let Some(joint) = physics.bind(anchor_object, other, anchor_point) else {
            return;
        };
        self.links.add_link(joint, anchor_object, other);

        // The join must not inherit the approach impact.
        let (a_lin, a_ang) = {
            let data = self.objects.get(anchor_object);
            (data.cached_linvel, data.cached_angvel)
        };
        let (b_lin, b_ang) = {
            let data = self.objects.get(other);
            (data.cached_linvel, data.cached_angvel)
        };
        physics.set_velocity(anchor_object, a_lin, a_ang);
        physics.set_velocity(other, b_lin, b_ang);

        let group_a = self.groups.group_of(anchor_object);
        let group_b = self.groups.group_of(other);
        self.groups.merge(group_a, group_b);
        self.groups.debug_assert_consistent();

        self.set_highlight_anchor(None);
        self.events.push(FusionEvent::JointCreated {
            a: anchor_object,
            b: other,
        });
        self.events.push(FusionEvent::GroupsMerged {
            anchor: anchor_object,
            other,
        });
    }

    /// Move the fusable highlight. Exactly one candidate group carries it;
    /// the previous group is cleared before the new one is applied.
    fn set_highlight_anchor(&mut self, anchor: Option<ObjectId>) {
        if self.highlight_anchor == anchor {
            return;
        }
        if let Some(old) = self.highlight_anchor {
            let members = self.groups.members_of(old).to_vec();
            for member in members {
                let data = self.objects.get_mut(member);
                if data.highlighted {
                    data.highlighted = false;
                    self.events.push(FusionEvent::HighlightChanged {
                        object: member,
                        enabled: false,
                    });
                }
            }
        }
        self.highlight_anchor = anchor;
        if let Some(new) = anchor {
            let members = self.groups.members_of(new).to_vec();
            for member in members {
                let data = self.objects.get_mut(member);
                if !data.highlighted {
                    data.highlighted = true;
                    self.events.push(FusionEvent::HighlightChanged {
                        object: member,
                        enabled: true,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPhysics;

    const DT: f32 = 1.0 / 60.0;

    fn view_toward_x() -> ViewPose {
        ViewPose::new(Vec3::new(-2.0, 0.0, 0.0), Vec3::X)
    }

    fn world_with_pair(physics: &mut MockPhysics) -> (FusionWorld, ObjectId, ObjectId) {
        let mut world = FusionWorld::default();
        let a = world.spawn_object(SnapPointSet::empty(), AnchorPolicy::ClosestFusedMember);
        let b = world.spawn_object(SnapPointSet::empty(), AnchorPolicy::ClosestFusedMember);
        physics.add_object(a, Vec3::ZERO);
        physics.add_object(b, Vec3::new(1.2, 0.0, 0.0));
        (world, a, b)
    }

    /// Drive grab -> candidate -> release -> approach until the fuse
    /// commits or the step budget runs out.
    fn fuse_pair(
        world: &mut FusionWorld,
        physics: &mut MockPhysics,
        view: &ViewPose,
    ) {
        world.grab(view, None, physics);
        assert!(world.is_holding());
        world.update(DT, view, physics);
        world.release(physics);
        for _ in 0..400 {
            world.update(DT, view, physics);
            if world.link_count() == 1 {
                return;
            }
        }
        panic!("fuse did not commit within the step budget");
    }

    #[test]
    fn grab_is_a_no_op_when_nothing_is_in_reach() {
        let mut world = FusionWorld::default();
        let mut physics = MockPhysics::new();
        world.grab(&view_toward_x(), None, &mut physics);
        assert!(!world.is_holding());
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn grab_captures_hold_state_and_release_frees_it() {
        let mut physics = MockPhysics::new();
        let (mut world, a, _) = world_with_pair(&mut physics);
        let view = view_toward_x();

        world.grab(&view, None, &mut physics);
        assert_eq!(world.held_object(), Some(a));
        assert!(physics.held.contains(&a));
        let held = world.held_state().unwrap();
        assert_eq!(held.hold_distance, 2.0);

        world.release(&mut physics);
        assert!(!world.is_holding());
        assert!(!physics.held.contains(&a));

        let events = world.drain_events();
        assert!(events.contains(&FusionEvent::Grabbed { object: a }));
        assert!(events.contains(&FusionEvent::Released { object: a }));
    }

    #[test]
    fn release_with_nothing_held_is_silent() {
        let mut world = FusionWorld::default();
        let mut physics = MockPhysics::new();
        world.release(&mut physics);
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn held_target_follows_view_distance_and_rotation_commands() {
        let mut physics = MockPhysics::new();
        let (mut world, a, _) = world_with_pair(&mut physics);
        let view = view_toward_x();

        world.grab(&view, None, &mut physics);
        for _ in 0..10 {
            world.move_away();
        }
        world.update(DT, &view, &mut physics);
        let (target, _) = physics.held_targets[&a];
        // Clamped to max hold distance from the view origin.
        assert!(target.distance(Vec3::new(0.5, 0.0, 0.0)) < 1e-5);

        for _ in 0..20 {
            world.move_towards();
        }
        world.update(DT, &view, &mut physics);
        let (target, _) = physics.held_targets[&a];
        assert!(target.distance(Vec3::new(-1.0, 0.0, 0.0)) < 1e-5);

        world.rotate_left();
        world.rotate_left();
        world.update(DT, &view, &mut physics);
        let (_, rotation) = physics.held_targets[&a];
        let expected = Quat::from_rotation_y(90.0_f32.to_radians());
        assert!(rotation.angle_between(expected) < 1e-3);
    }

    #[test]
    fn rotation_commands_without_a_held_object_are_silent() {
        let mut world = FusionWorld::default();
        world.rotate_left();
        world.move_away();
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn candidate_highlight_follows_the_winning_candidate() {
        let mut physics = MockPhysics::new();
        let (mut world, _, b) = world_with_pair(&mut physics);
        let view = view_toward_x();

        world.grab(&view, None, &mut physics);
        world.update(DT, &view, &mut physics);
        assert!(world.highlighted(b));
        let events = world.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, FusionEvent::CandidateFound { other, .. } if *other == b)));

        // Candidate leaves range: highlight clears.
        physics.positions.insert(b, Vec3::new(10.0, 0.0, 0.0));
        world.update(DT, &view, &mut physics);
        assert!(!world.highlighted(b));
        let events = world.drain_events();
        assert!(events.contains(&FusionEvent::CandidateCleared));
    }

    #[test]
    fn full_fuse_flow_merges_groups_and_creates_one_link() {
        let mut physics = MockPhysics::new();
        let (mut world, a, b) = world_with_pair(&mut physics);
        let view = view_toward_x();

        // The candidate carries some drift velocity that the commit must
        // restore after the approach impact.
        physics.velocities.insert(b, (Vec3::new(0.0, 0.0, 0.3), Vec3::ZERO));

        fuse_pair(&mut world, &mut physics, &view);

        let mut members = world.group_members(a).to_vec();
        members.sort();
        assert_eq!(members, vec![a, b]);
        assert_eq!(world.group_members(b), world.group_members(a));
        assert_eq!(physics.bound.len(), 1);
        assert_eq!(physics.bound[0].0, a);
        assert_eq!(physics.bound[0].1, b);

        assert!(physics
            .restored_velocities
            .iter()
            .any(|(id, lin, _)| *id == b && lin.z == 0.3));

        let events = world.drain_events();
        assert!(events.contains(&FusionEvent::JointCreated { a, b }));
        assert!(events.contains(&FusionEvent::GroupsMerged { anchor: a, other: b }));
        // The fuse is done; no highlight survives.
        assert!(!world.highlighted(a) && !world.highlighted(b));
    }

    #[test]
    fn split_restores_singletons_and_destroys_joints() {
        let mut physics = MockPhysics::new();
        let (mut world, a, b) = world_with_pair(&mut physics);
        let view = view_toward_x();
        fuse_pair(&mut world, &mut physics, &view);
        let joint = physics.bound[0].3;

        world.split(a, &mut physics);
        assert_eq!(world.group_members(a), &[a]);
        assert_eq!(world.group_members(b), &[b]);
        assert_eq!(world.link_count(), 0);
        assert_eq!(physics.unbound, vec![joint]);

        // Splitting an already-singleton group is a silent no-op.
        world.drain_events();
        world.split(a, &mut physics);
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn shake_on_held_object_splits_its_group() {
        let mut physics = MockPhysics::new();
        let (mut world, a, b) = world_with_pair(&mut physics);
        let view = view_toward_x();
        fuse_pair(&mut world, &mut physics, &view);

        world.grab(&view, None, &mut physics);
        assert!(world.is_holding());
        world.on_shake_detected(&mut physics);

        assert_eq!(world.group_members(a), &[a]);
        assert_eq!(world.group_members(b), &[b]);
        // The shaken piece stays in hand.
        assert_eq!(world.held_object(), Some(a));
    }

    #[test]
    fn regrab_mid_approach_discards_the_animation() {
        let mut physics = MockPhysics::new();
        let (mut world, a, _) = world_with_pair(&mut physics);
        let view = view_toward_x();

        world.grab(&view, None, &mut physics);
        world.update(DT, &view, &mut physics);
        world.release(&mut physics);
        // A few approach steps, then re-grip before the commit.
        for _ in 0..5 {
            world.update(DT, &view, &mut physics);
        }
        assert_eq!(world.link_count(), 0);
        world.grab(&view, None, &mut physics);
        assert_eq!(world.held_object(), Some(a));

        // Holding suppresses the animator; no joint may ever appear.
        for _ in 0..200 {
            world.update(DT, &view, &mut physics);
        }
        assert_eq!(world.link_count(), 0);
        assert!(physics.bound.is_empty());
    }

    #[test]
    fn standing_on_a_fused_member_blocks_grabbing_the_group() {
        let mut physics = MockPhysics::new();
        let (mut world, a, b) = world_with_pair(&mut physics);
        let view = view_toward_x();
        fuse_pair(&mut world, &mut physics, &view);

        // Standing on B blocks grabbing A (same fused group).
        world.grab(&view, Some(b), &mut physics);
        assert!(!world.is_holding());

        // Standing on an unrelated object does not.
        let c = world.spawn_object(SnapPointSet::empty(), AnchorPolicy::ClosestFusedMember);
        physics.add_object(c, Vec3::new(0.0, 5.0, 0.0));
        world.grab(&view, Some(c), &mut physics);
        assert!(world.is_holding());
    }

    #[test]
    fn grabbed_root_policy_anchors_the_joint_on_the_grabbed_object() {
        let mut physics = MockPhysics::new();
        let mut world = FusionWorld::default();
        let a = world.spawn_object(SnapPointSet::empty(), AnchorPolicy::GrabbedRoot);
        let b = world.spawn_object(SnapPointSet::empty(), AnchorPolicy::ClosestFusedMember);
        let c = world.spawn_object(SnapPointSet::empty(), AnchorPolicy::ClosestFusedMember);
        physics.add_object(a, Vec3::ZERO);
        physics.add_object(b, Vec3::new(1.2, 0.0, 0.0));
        physics.add_object(c, Vec3::new(2.4, 0.0, 0.0));

        let view = view_toward_x();
        fuse_pair(&mut world, &mut physics, &view);

        // Grab A again; the candidate C is near B, the group's far member.
        world.grab(&view, None, &mut physics);
        world.update(DT, &view, &mut physics);
        let candidate = world.held_state().unwrap().candidate.expect("candidate");
        assert_eq!(candidate.held_member, b);
        assert_eq!(candidate.other, c);

        world.release(&mut physics);
        for _ in 0..400 {
            world.update(DT, &view, &mut physics);
            if world.link_count() == 2 {
                break;
            }
        }
        // GrabbedRoot policy: the new joint anchors on A, not B.
        let last = physics.bound.last().unwrap();
        assert_eq!(last.0, a);
        assert_eq!(last.1, c);

        let mut members = world.group_members(a).to_vec();
        members.sort();
        assert_eq!(members, vec![a, b, c]);
    }
}
