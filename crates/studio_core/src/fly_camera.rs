//! Free-fly camera for walking around the build yard.
//!
//! - WASD: move on the view plane, Q/E: down/up
//! - Right mouse drag: look around

use bevy::input::mouse::AccumulatedMouseMotion;
use bevy::prelude::*;

#[derive(Component)]
pub struct FlyCamera {
    /// Movement speed (units/sec)
    pub move_speed: f32,
    /// Look sensitivity (radians per pixel)
    pub look_sensitivity: f32,
    /// Horizontal angle (radians)
    pub yaw: f32,
    /// Vertical angle (radians), clamped to avoid gimbal lock
    pub pitch: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            move_speed: 6.0,
            look_sensitivity: 0.003,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

impl FlyCamera {
    /// Create a camera state already facing along the given yaw/pitch.
    pub fn with_angles(yaw: f32, pitch: f32) -> Self {
        Self {
            yaw,
            pitch,
            ..Default::default()
        }
    }
}

/// System that applies look and movement input to the fly camera.
pub fn fly_camera_system(
    time: Res<Time>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mut query: Query<(&mut FlyCamera, &mut Transform)>,
) {
    let dt = time.delta_secs();

    for (mut camera, mut transform) in query.iter_mut() {
        if mouse_button.pressed(MouseButton::Right) {
            let delta = mouse_motion.delta;
            camera.yaw -= delta.x * camera.look_sensitivity;
            camera.pitch =
                (camera.pitch - delta.y * camera.look_sensitivity).clamp(-1.5, 1.5);
        }

        transform.rotation = Quat::from_euler(EulerRot::YXZ, camera.yaw, camera.pitch, 0.0);

        let mut input = Vec3::ZERO;
        if keyboard.pressed(KeyCode::KeyW) {
            input.z -= 1.0;
        }
        if keyboard.pressed(KeyCode::KeyS) {
            input.z += 1.0;
        }
        if keyboard.pressed(KeyCode::KeyA) {
            input.x -= 1.0;
        }
        if keyboard.pressed(KeyCode::KeyD) {
            input.x += 1.0;
        }
        if keyboard.pressed(KeyCode::KeyE) {
            input.y += 1.0;
        }
        if keyboard.pressed(KeyCode::KeyQ) {
            input.y -= 1.0;
        }

        if input.length_squared() > 0.0 {
            let movement = transform.rotation * input.normalize() * camera.move_speed * dt;
            transform.translation += movement;
        }
    }
}

/// Plugin that adds fly camera movement.
pub struct FlyCameraPlugin;

impl Plugin for FlyCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, fly_camera_system);
    }
}
