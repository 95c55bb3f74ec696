//! Per-step search for the best fusion candidate near a held group.

use crate::object::ObjectId;
use crate::spatial::SpatialQuery;

/// The winning (held member, nearby object) pairing for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionCandidate {
    /// The held-group member closest to the candidate.
    pub held_member: ObjectId,
    /// The object the group would fuse to.
    pub other: ObjectId,
    /// Euclidean distance between the two origins.
    pub distance: f32,
}

/// Find the closest eligible fusion pairing for the held group.
///
/// For every member with a resolvable pose, overlapping moveable objects
/// are collected, members of the held group itself are discarded, and each
/// survivor must have a clear line of sight from the member (the member's
/// own group never blocks; a ray whose first hit is the candidate itself
/// counts as clear). The minimum-distance pair wins; exact ties keep the
/// first pair encountered, which is iteration-order dependent and
/// deliberately not part of the contract.
pub fn select_fusion_candidate(
    held_members: &[ObjectId],
    physics: &impl SpatialQuery,
    proximity_radius: f32,
) -> Option<FusionCandidate> {
    let mut best: Option<FusionCandidate> = None;

    for &member in held_members {
        let Some((member_pos, _)) = physics.object_pose(member) else {
            // Detached mid-flight or despawned; not an error.
            continue;
        };

        for other in physics.sweep_overlap(member_pos, proximity_radius) {
            if held_members.contains(&other) {
                continue;
            }
            let Some((other_pos, _)) = physics.object_pose(other) else {
                continue;
            };

            match physics.line_trace(member_pos, other_pos, held_members) {
                Some(hit) if hit.object != Some(other) => continue,
                _ => {}
            }

            let distance = member_pos.distance(other_pos);
            if best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(FusionCandidate {
                    held_member: member,
                    other,
                    distance,
                });
            }
        }
    }

    best
}
