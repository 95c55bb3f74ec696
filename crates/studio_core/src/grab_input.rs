//! Input translation for the grab controller.
//!
//! Keyboard/mouse state becomes `GrabCommand`s on a queue; the physics
//! bridge applies them to the `FusionWorld` each frame. Pointer deltas
//! feed the shake detector while an object is held.

use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll};
use bevy::prelude::*;

use crate::config::GrabConfig;
use crate::fusion_world::FusionWorld;
use crate::shake::ShakeDetector;

/// One frame-level command for the grab controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabCommand {
    Grab,
    Release,
    RotateLeft,
    RotateRight,
    RotateUp,
    RotateDown,
    MoveTowards,
    MoveAway,
    /// Shake gesture: split the held group.
    Split,
}

/// Commands queued this frame, drained by the physics bridge.
#[derive(Debug, Default, Resource)]
pub struct GrabCommandQueue {
    commands: Vec<GrabCommand>,
}

impl GrabCommandQueue {
    pub fn push(&mut self, command: GrabCommand) {
        self.commands.push(command);
    }

    pub fn drain(&mut self) -> Vec<GrabCommand> {
        std::mem::take(&mut self.commands)
    }
}

/// Plugin wiring default bindings:
/// - Left mouse: grab / release
/// - Arrow keys: rotate the held piece in 45 degree steps
/// - Scroll wheel: adjust hold distance
/// - Shaking the mouse while holding: split the held group
pub struct GrabInputPlugin;

impl Plugin for GrabInputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GrabConfig>()
            .init_resource::<GrabCommandQueue>()
            .init_resource::<ShakeDetector>()
            .add_systems(Startup, configure_shake_detector)
            .add_systems(Update, (grab_input_system, shake_tracking_system));
    }
}

fn configure_shake_detector(config: Res<GrabConfig>, mut shake: ResMut<ShakeDetector>) {
    *shake = ShakeDetector::new(
        config.shake_max_samples,
        config.shake_max_direction_changes,
        config.shake_threshold,
    );
}

fn grab_input_system(
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse_scroll: Res<AccumulatedMouseScroll>,
    fusion: Option<Res<FusionWorld>>,
    mut queue: ResMut<GrabCommandQueue>,
) {
    let Some(fusion) = fusion else {
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) {
        queue.push(if fusion.is_holding() {
            GrabCommand::Release
        } else {
            GrabCommand::Grab
        });
    }

    if keyboard.just_pressed(KeyCode::ArrowLeft) {
        queue.push(GrabCommand::RotateLeft);
    }
    if keyboard.just_pressed(KeyCode::ArrowRight) {
        queue.push(GrabCommand::RotateRight);
    }
    if keyboard.just_pressed(KeyCode::ArrowUp) {
        queue.push(GrabCommand::RotateUp);
    }
    if keyboard.just_pressed(KeyCode::ArrowDown) {
        queue.push(GrabCommand::RotateDown);
    }

    let scroll = mouse_scroll.delta.y;
    if scroll > 0.0 {
        queue.push(GrabCommand::MoveAway);
    } else if scroll < 0.0 {
        queue.push(GrabCommand::MoveTowards);
    }
}

fn shake_tracking_system(
    mouse_motion: Res<AccumulatedMouseMotion>,
    fusion: Option<Res<FusionWorld>>,
    mut shake: ResMut<ShakeDetector>,
    mut queue: ResMut<GrabCommandQueue>,
) {
    let Some(fusion) = fusion else {
        return;
    };
    if !fusion.is_holding() {
        shake.reset();
        return;
    }
    let delta = mouse_motion.delta;
    if shake.push(delta.x, delta.y) {
        queue.push(GrabCommand::Split);
    }
}
