use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in world space.
///
/// Overlap tests use inclusive bounds, so boxes that merely touch still
/// count as colliding. Gameplay collision runs in the XY plane; the 3D
/// variant additionally checks depth and is used for bullet volumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Aabb { min, max }
    }

    /// Builds the box around a positional center.
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.scale(0.5);
        Aabb {
            min: Vec3::new(center.x - half.x, center.y - half.y, center.z - half.z),
            max: Vec3::new(center.x + half.x, center.y + half.y, center.z + half.z),
        }
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Overlap test restricted to the gameplay plane.
    pub fn overlaps_2d(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Full volume overlap test.
    pub fn overlaps_3d(&self, other: &Aabb) -> bool {
        self.overlaps_2d(other) && self.min.z <= other.max.z && other.min.z <= self.max.z
    }

    /// Whether a point lies inside the box in the gameplay plane.
    pub fn contains_2d(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Returns the box expanded by `margin` on every side.
    pub fn grown(&self, margin: f32) -> Aabb {
        Aabb {
            min: Vec3::new(self.min.x - margin, self.min.y - margin, self.min.z - margin),
            max: Vec3::new(self.max.x + margin, self.max.y + margin, self.max.z + margin),
        }
    }

    /// Smallest box covering both operands.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(x: f32, y: f32) -> Aabb {
        Aabb::from_center_size(Vec3::new(x, y, 0.0), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_overlapping_boxes() {
        let a = unit_box_at(0.0, 0.0);
        let b = unit_box_at(0.5, 0.5);
        assert!(a.overlaps_2d(&b));
        assert!(b.overlaps_2d(&a));
    }

    #[test]
    fn test_separated_boxes() {
        let a = unit_box_at(0.0, 0.0);
        let b = unit_box_at(3.0, 0.0);
        assert!(!a.overlaps_2d(&b));

        let c = unit_box_at(0.0, -3.0);
        assert!(!a.overlaps_2d(&c));
    }

    #[test]
    fn test_touching_boxes_collide() {
        // Inclusive bounds: sharing an edge counts as overlap.
        let a = unit_box_at(0.0, 0.0);
        let b = unit_box_at(1.0, 0.0);
        assert!(a.overlaps_2d(&b));
    }

    #[test]
    fn test_depth_separation_only_matters_in_3d() {
        let a = Aabb::from_center_size(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.2));
        let b = Aabb::from_center_size(Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 1.0, 0.2));
        assert!(a.overlaps_2d(&b));
        assert!(!a.overlaps_3d(&b));
    }

    #[test]
    fn test_contains_point() {
        let a = unit_box_at(0.0, 0.0);
        assert!(a.contains_2d(Vec3::new(0.4, -0.4, 0.0)));
        assert!(!a.contains_2d(Vec3::new(0.0, 0.6, 0.0)));
    }

    #[test]
    fn test_grown_box() {
        let a = unit_box_at(0.0, 0.0).grown(2.0);
        assert!(a.contains_2d(Vec3::new(2.4, 2.4, 0.0)));
        assert!(!a.contains_2d(Vec3::new(2.6, 0.0, 0.0)));
    }

    #[test]
    fn test_union_covers_both() {
        let a = unit_box_at(0.0, 0.0);
        let b = unit_box_at(4.0, 1.0);
        let u = a.union(&b);
        assert!(u.contains_2d(Vec3::new(-0.5, -0.5, 0.0)));
        assert!(u.contains_2d(Vec3::new(4.5, 1.5, 0.0)));
    }
}
