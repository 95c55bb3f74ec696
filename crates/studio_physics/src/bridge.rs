//! Bevy bridge between the fusion core and the rapier world.
//!
//! Systems run in a fixed order each frame: queued grab commands are
//! applied, the fusion world is driven one step, physics steps, entity
//! transforms sync from their bodies, and recorded fusion events are
//! mirrored into logs and highlight components.

use std::collections::HashMap;

use bevy::prelude::*;
use rapier3d::prelude as rapier;

use studio_core::{
    CorePlugin, FusionConfig, FusionEvent, FusionWorld, GrabCommand, GrabCommandQueue, ObjectId,
    SnapPointSet, ViewPose,
};

use crate::PhysicsState;

/// Links a Bevy entity to a Rapier rigid body
#[derive(Component)]
pub struct RigidBodyLink(pub rapier::RigidBodyHandle);

/// Links a Bevy entity to its fusion core object.
#[derive(Component)]
pub struct MoveableLink(pub ObjectId);

/// Mirror of the core's fusable highlight flag, for material systems.
#[derive(Component, Default)]
pub struct FusableHighlight(pub bool);

/// Marker for the transform that supplies the grab viewpoint.
#[derive(Component)]
pub struct GrabView;

/// Entity lookup for fusion objects.
#[derive(Resource, Default)]
pub struct MoveableIndex {
    entities: HashMap<ObjectId, Entity>,
}

impl MoveableIndex {
    pub fn insert(&mut self, object: ObjectId, entity: Entity) {
        self.entities.insert(object, entity);
    }

    pub fn get(&self, object: ObjectId) -> Option<Entity> {
        self.entities.get(&object).copied()
    }
}

/// The moveable object the grabbing agent currently stands on, if any.
/// Stays `None` for free-flying agents; a character controller sets it.
#[derive(Resource, Default)]
pub struct StandingOn(pub Option<ObjectId>);

/// Plugin wiring the complete build system: fusion core, rapier world,
/// input translation and transform sync.
///
/// Inserts `FusionWorld` and `PhysicsState` with default tuning; insert
/// your own configured resources after adding the plugin to override.
pub struct BuildSystemPlugin;

impl Plugin for BuildSystemPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(CorePlugin)
            .init_resource::<FusionConfig>()
            .init_resource::<MoveableIndex>()
            .init_resource::<StandingOn>()
            .insert_resource(PhysicsState::new())
            .insert_resource(FusionWorld::default())
            .add_systems(
                Update,
                (
                    apply_grab_commands,
                    drive_fusion,
                    step_physics,
                    sync_transforms,
                    mirror_fusion_events,
                )
                    .chain(),
            );
    }
}

/// Register one moveable object in the core, the physics world, and the
/// ECS. The caller attaches its own visuals to the returned entity.
pub fn spawn_moveable(
    commands: &mut Commands,
    fusion: &mut FusionWorld,
    physics: &mut PhysicsState,
    index: &mut MoveableIndex,
    position: Vec3,
    rotation: Quat,
    half_extents: Vec3,
    snap_points: SnapPointSet,
    anchor_policy: studio_core::AnchorPolicy,
) -> Entity {
    let object = fusion.spawn_object(snap_points, anchor_policy);
    let body = physics.register_moveable(object, position, rotation, half_extents);
    let entity = commands
        .spawn((
            Transform::from_translation(position).with_rotation(rotation),
            MoveableLink(object),
            RigidBodyLink(body),
            FusableHighlight::default(),
        ))
        .id();
    index.insert(object, entity);
    entity
}

fn view_pose(query: &Query<&Transform, With<GrabView>>) -> Option<ViewPose> {
    let transform = query.single().ok()?;
    Some(ViewPose::new(
        transform.translation,
        transform.rotation * -Vec3::Z,
    ))
}

fn apply_grab_commands(
    mut queue: ResMut<GrabCommandQueue>,
    mut fusion: ResMut<FusionWorld>,
    mut physics: ResMut<PhysicsState>,
    standing_on: Res<StandingOn>,
    view_query: Query<&Transform, With<GrabView>>,
) {
    let commands = queue.drain();
    let Some(view) = view_pose(&view_query) else {
        return;
    };
    for command in commands {
        match command {
            GrabCommand::Grab => fusion.grab(&view, standing_on.0, &mut *physics),
            GrabCommand::Release => fusion.release(&mut *physics),
            GrabCommand::RotateLeft => fusion.rotate_left(),
            GrabCommand::RotateRight => fusion.rotate_right(),
            GrabCommand::RotateUp => fusion.rotate_up(),
            GrabCommand::RotateDown => fusion.rotate_down(),
            GrabCommand::MoveTowards => fusion.move_towards(),
            GrabCommand::MoveAway => fusion.move_away(),
            GrabCommand::Split => fusion.on_shake_detected(&mut *physics),
        }
    }
}

fn drive_fusion(
    time: Res<Time>,
    mut fusion: ResMut<FusionWorld>,
    mut physics: ResMut<PhysicsState>,
    view_query: Query<&Transform, With<GrabView>>,
) {
    let Some(view) = view_pose(&view_query) else {
        return;
    };
    let dt = time.delta_secs().min(0.05); // Cap delta time
    if dt > 0.0 {
        fusion.update(dt, &view, &mut *physics);
    }
}

fn step_physics(time: Res<Time>, mut physics: ResMut<PhysicsState>) {
    let dt = time.delta_secs().min(0.05);
    if dt > 0.0 {
        physics.step(dt);
    }
}

fn sync_transforms(physics: Res<PhysicsState>, mut query: Query<(&RigidBodyLink, &mut Transform)>) {
    for (link, mut transform) in query.iter_mut() {
        if let Some(body) = physics.rigid_body_set.get(link.0) {
            let pos = body.translation();
            let rot = body.rotation();
            transform.translation = Vec3::new(pos.x, pos.y, pos.z);
            transform.rotation = Quat::from_xyzw(rot.i, rot.j, rot.k, rot.w);
        }
    }
}

fn mirror_fusion_events(
    mut fusion: ResMut<FusionWorld>,
    index: Res<MoveableIndex>,
    mut highlights: Query<&mut FusableHighlight>,
) {
    for event in fusion.drain_events() {
        match event {
            FusionEvent::HighlightChanged { object, enabled } => {
                if let Some(entity) = index.get(object) {
                    if let Ok(mut highlight) = highlights.get_mut(entity) {
                        highlight.0 = enabled;
                    }
                }
            }
            FusionEvent::Grabbed { object } => info!("grabbed {object:?}"),
            FusionEvent::Released { object } => info!("released {object:?}"),
            FusionEvent::CandidateFound { held_member, other } => {
                debug!("fusion candidate {other:?} (via {held_member:?})");
            }
            FusionEvent::CandidateCleared => debug!("fusion candidate cleared"),
            FusionEvent::FuseStarted { held_member, other } => {
                info!("fusing {held_member:?} -> {other:?}");
            }
            FusionEvent::JointCreated { a, b } => info!("joint created {a:?} <-> {b:?}"),
            FusionEvent::JointDestroyed { a, b } => info!("joint destroyed {a:?} <-> {b:?}"),
            FusionEvent::GroupsMerged { anchor, other } => {
                debug!("groups merged at {anchor:?} + {other:?}");
            }
            FusionEvent::GroupSplit { object } => info!("group split at {object:?}"),
        }
    }
}
