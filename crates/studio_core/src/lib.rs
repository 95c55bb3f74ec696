//! Core fusion logic and shared types for Contraption 3D Studio.
//!
//! This crate provides:
//! - The fused-group partition and constraint link graph
//! - Per-step fusion candidate selection
//! - The approach animator that closes the gap before a joint commits
//! - The grab controller state machine and its input plugin
//! - Snap point registry for typed attachment seams
//! - Rotation rounding and shake gesture detection
//! - Configuration management
//!
//! The physics engine is a collaborator, consumed through the traits in
//! [`spatial`]; this crate never simulates bodies itself.

use bevy::prelude::*;

pub mod candidate;
pub mod config;
pub mod constraint_link;
pub mod fly_camera;
pub mod fusion_animator;
pub mod fusion_group;
pub mod fusion_world;
pub mod grab_input;
pub mod object;
pub mod rotation_snap;
pub mod shake;
pub mod snap_point;
pub mod spatial;

#[cfg(test)]
pub(crate) mod testing;

pub use candidate::{select_fusion_candidate, FusionCandidate};
pub use config::{
    load_config, save_config, ConfigError, ConfigResult, FusionConfig, GrabConfig, StudioConfig,
};
pub use constraint_link::{ConstraintLink, JointKey, LinkGraph, LinkId};
pub use fly_camera::{fly_camera_system, FlyCamera, FlyCameraPlugin};
pub use fusion_animator::{compute_fuse_points, AnimatorStep, FuseAnimator, FusePoints};
pub use fusion_group::{FusionGroupTable, GroupId};
pub use fusion_world::{FusionEvent, FusionWorld, HeldState};
pub use grab_input::{GrabCommand, GrabCommandQueue, GrabInputPlugin};
pub use object::{AnchorPolicy, ObjectArena, ObjectData, ObjectId};
pub use rotation_snap::{
    round_angle_degrees, round_rotation_degrees, snap_rotation, ROTATION_STEP_DEGREES,
};
pub use shake::ShakeDetector;
pub use snap_point::{closest_point_to_reference, SnapPoint, SnapPointSet, SnapType};
pub use spatial::{ConstraintBackend, SpatialQuery, TraceHit, ViewPose};

/// Core plugin for shared functionality.
pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(GrabInputPlugin)
            .add_plugins(FlyCameraPlugin);
    }
}
