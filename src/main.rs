use bevy::prelude::*;
use studio_core::{AnchorPolicy, FlyCamera, FusionWorld, SnapPoint, SnapPointSet, SnapType};
use studio_physics::{
    spawn_moveable, BuildSystemPlugin, FusableHighlight, GrabView, MoveableIndex, PhysicsState,
};

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(BuildSystemPlugin)
        // Dark background
        .insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.08)))
        .add_systems(Startup, setup)
        .add_systems(Update, highlight_materials)
        .run();
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut fusion: ResMut<FusionWorld>,
    mut physics: ResMut<PhysicsState>,
    mut index: ResMut<MoveableIndex>,
) {
    // Fly camera doubling as the grab viewpoint.
    commands.spawn((
        Camera3d::default(),
        FlyCamera::with_angles(0.0, -0.3),
        GrabView,
        Transform::from_xyz(0.0, 2.0, 6.0),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.5, 0.5, 0.0)),
    ));

    // Ground slab, top face at y = 0.
    physics.add_static_box(Vec3::new(0.0, -0.5, 0.0), Vec3::new(10.0, 0.5, 10.0));
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(20.0, 1.0, 20.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.5, 0.3))),
        Transform::from_xyz(0.0, -0.5, 0.0),
    ));

    // A few beams lying around the yard.
    let beam_half = Vec3::new(0.75, 0.125, 0.125);
    let beam_snaps = || {
        SnapPointSet::new(vec![
            SnapPoint::new(Vec3::new(-0.75, 0.0, 0.0), SnapType::BeamEnd),
            SnapPoint::new(Vec3::new(0.75, 0.0, 0.0), SnapType::BeamEnd),
            SnapPoint::new(Vec3::ZERO, SnapType::BeamMiddle),
        ])
    };
    for (i, position) in [
        Vec3::new(-1.5, 0.125, 0.0),
        Vec3::new(0.5, 0.125, -1.0),
        Vec3::new(1.5, 0.125, 1.0),
    ]
    .into_iter()
    .enumerate()
    {
        let entity = spawn_moveable(
            &mut commands,
            &mut fusion,
            &mut physics,
            &mut index,
            position,
            Quat::from_rotation_y(0.4 * i as f32),
            beam_half,
            beam_snaps(),
            AnchorPolicy::ClosestFusedMember,
        );
        commands.entity(entity).insert((
            Mesh3d(meshes.add(Cuboid::new(1.5, 0.25, 0.25))),
            MeshMaterial3d(materials.add(Color::srgb(0.6, 0.45, 0.25))),
        ));
    }

    // Boards whose joints anchor on the grabbed piece itself.
    let board_half = Vec3::new(0.5, 0.05, 0.5);
    let board_snaps = || {
        SnapPointSet::new(vec![
            SnapPoint::new(Vec3::new(0.0, 0.05, 0.0), SnapType::BoardTop),
            SnapPoint::new(Vec3::new(0.5, 0.0, 0.0), SnapType::BoardSide),
            SnapPoint::new(Vec3::new(-0.5, 0.0, 0.0), SnapType::BoardSide),
            SnapPoint::new(Vec3::new(0.0, 0.0, 0.5), SnapType::BoardFront),
        ])
    };
    for position in [Vec3::new(-0.5, 0.05, 1.5), Vec3::new(2.0, 0.05, -0.5)] {
        let entity = spawn_moveable(
            &mut commands,
            &mut fusion,
            &mut physics,
            &mut index,
            position,
            Quat::IDENTITY,
            board_half,
            board_snaps(),
            AnchorPolicy::GrabbedRoot,
        );
        commands.entity(entity).insert((
            Mesh3d(meshes.add(Cuboid::new(1.0, 0.1, 1.0))),
            MeshMaterial3d(materials.add(Color::srgb(0.8, 0.7, 0.5))),
        ));
    }

    physics.refresh_queries();
}

/// Mirror the fusable highlight flag into an emissive tint.
fn highlight_materials(
    mut materials: ResMut<Assets<StandardMaterial>>,
    query: Query<
        (&FusableHighlight, &MeshMaterial3d<StandardMaterial>),
        Changed<FusableHighlight>,
    >,
) {
    for (highlight, material) in query.iter() {
        if let Some(material) = materials.get_mut(&material.0) {
            material.emissive = if highlight.0 {
                LinearRgba::rgb(0.9, 0.7, 0.1)
            } else {
                LinearRgba::BLACK
            };
        }
    }
}
