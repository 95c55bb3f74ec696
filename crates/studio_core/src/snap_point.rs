//! Typed attachment points on moveable objects.
//!
//! Snap points bias fusion alignment toward intentional seams: when the
//! animator's closest-point refinement lands near one, the snap point's
//! position and orientation replace the raw surface point.

use bevy::prelude::*;

/// Attachment categories available to moveable object archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapType {
    Base,
    BeamEnd,
    BeamMiddle,
    BoardTop,
    BoardSide,
    BoardFront,
    FanBottom,
    WheelCenter,
    WheelOuter,
}

/// A typed, oriented attachment locus on an object's surface.
///
/// Read-only after construction; world position is derived from the owning
/// object's pose at query time.
#[derive(Debug, Clone)]
pub struct SnapPoint {
    /// Offset from the owner's origin, in the owner's local frame.
    pub local_translation: Vec3,
    /// Orientation of the seam, in the owner's local frame.
    pub local_rotation: Quat,
    pub snap_type: SnapType,
    /// Acceptable partner types. Empty means any type may pair.
    pub compatible_types: Vec<SnapType>,
}

impl SnapPoint {
    pub fn new(local_translation: Vec3, snap_type: SnapType) -> Self {
        Self {
            local_translation,
            local_rotation: Quat::IDENTITY,
            snap_type,
            compatible_types: Vec::new(),
        }
    }

    pub fn with_rotation(mut self, local_rotation: Quat) -> Self {
        self.local_rotation = local_rotation;
        self
    }

    pub fn with_compatible_types(mut self, types: Vec<SnapType>) -> Self {
        self.compatible_types = types;
        self
    }

    /// Whether this point accepts a partner of the given type.
    pub fn accepts(&self, other: SnapType) -> bool {
        self.compatible_types.is_empty() || self.compatible_types.contains(&other)
    }

    /// World position given the owner's current pose.
    pub fn world_position(&self, owner_pos: Vec3, owner_rot: Quat) -> Vec3 {
        owner_pos + owner_rot * self.local_translation
    }

    /// World orientation given the owner's current rotation.
    pub fn world_rotation(&self, owner_rot: Quat) -> Quat {
        owner_rot * self.local_rotation
    }
}

/// The snap points owned by a single moveable object.
#[derive(Debug, Clone, Default)]
pub struct SnapPointSet {
    points: Vec<SnapPoint>,
}

impl SnapPointSet {
    pub fn new(points: Vec<SnapPoint>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapPoint> {
        self.points.iter()
    }

    /// Every snap point whose world position lies within `radius` of
    /// `origin`. Squared-distance comparison, no side effects.
    pub fn points_within_radius(
        &self,
        owner_pos: Vec3,
        owner_rot: Quat,
        origin: Vec3,
        radius: f32,
    ) -> Vec<&SnapPoint> {
        let radius_sq = radius * radius;
        self.points
            .iter()
            .filter(|p| {
                p.world_position(owner_pos, owner_rot).distance_squared(origin) <= radius_sq
            })
            .collect()
    }
}

/// Linear scan for the point nearest `reference`. Ties keep the first
/// encountered at the minimal distance. Returns `None` on empty input.
pub fn closest_point_to_reference<'a>(
    points: &[&'a SnapPoint],
    owner_pos: Vec3,
    owner_rot: Quat,
    reference: Vec3,
) -> Option<&'a SnapPoint> {
    let mut best: Option<(&SnapPoint, f32)> = None;
    for point in points {
        let dist_sq = point
            .world_position(owner_pos, owner_rot)
            .distance_squared(reference);
        if best.map_or(true, |(_, d)| dist_sq < d) {
            best = Some((point, dist_sq));
        }
    }
    best.map(|(p, _)| p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beam_points() -> SnapPointSet {
        SnapPointSet::new(vec![
            SnapPoint::new(Vec3::new(-1.0, 0.0, 0.0), SnapType::BeamEnd),
            SnapPoint::new(Vec3::new(1.0, 0.0, 0.0), SnapType::BeamEnd),
            SnapPoint::new(Vec3::ZERO, SnapType::BeamMiddle),
        ])
    }

    #[test]
    fn radius_query_filters_by_world_distance() {
        let set = beam_points();
        let near_left = set.points_within_radius(
            Vec3::ZERO,
            Quat::IDENTITY,
            Vec3::new(-1.1, 0.0, 0.0),
            0.25,
        );
        assert_eq!(near_left.len(), 1);
        assert_eq!(near_left[0].local_translation.x, -1.0);
    }

    #[test]
    fn radius_query_respects_owner_rotation() {
        let set = beam_points();
        // Rotate the beam 90 degrees around Y: the +X end moves to -Z.
        let rot = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let near = set.points_within_radius(Vec3::ZERO, rot, Vec3::new(0.0, 0.0, -1.0), 0.1);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].local_translation.x, 1.0);
    }

    #[test]
    fn closest_point_returns_none_on_empty_input() {
        assert!(closest_point_to_reference(&[], Vec3::ZERO, Quat::IDENTITY, Vec3::ZERO).is_none());
    }

    #[test]
    fn closest_point_is_stable_on_ties() {
        let a = SnapPoint::new(Vec3::new(1.0, 0.0, 0.0), SnapType::BeamEnd);
        let b = SnapPoint::new(Vec3::new(-1.0, 0.0, 0.0), SnapType::BeamEnd);
        // Both points are exactly 1.0 from the origin; first encountered wins.
        let picked =
            closest_point_to_reference(&[&a, &b], Vec3::ZERO, Quat::IDENTITY, Vec3::ZERO).unwrap();
        assert_eq!(picked.local_translation, a.local_translation);
    }

    #[test]
    fn empty_compatibility_list_accepts_anything() {
        let point = SnapPoint::new(Vec3::ZERO, SnapType::BoardTop);
        assert!(point.accepts(SnapType::WheelOuter));
        assert!(point.accepts(SnapType::Base));
    }

    #[test]
    fn compatibility_list_filters_partner_types() {
        let point = SnapPoint::new(Vec3::ZERO, SnapType::BeamEnd)
            .with_compatible_types(vec![SnapType::BoardTop, SnapType::BeamEnd]);
        assert!(point.accepts(SnapType::BoardTop));
        assert!(!point.accepts(SnapType::WheelCenter));
    }
}
