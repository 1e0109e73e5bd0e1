//! Spatial primitives.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in the world. No unit conversion is applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate3 {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Straight-line distance.
    pub fn distance_to(&self, other: &Coordinate3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Absolute difference along the vertical (y) axis.
    pub fn vertical_offset(&self, other: &Coordinate3) -> f64 {
        (self.y - other.y).abs()
    }

    /// The block cell containing this point.
    pub fn block(&self) -> BlockPos {
        BlockPos {
            x: self.x.floor() as i64,
            y: self.y.floor() as i64,
            z: self.z.floor() as i64,
        }
    }

    /// Move at most `step` units towards `target`.
    pub fn step_towards(&self, target: &Coordinate3, step: f64) -> Coordinate3 {
        let distance = self.distance_to(target);
        if distance <= step || distance == 0.0 {
            return *target;
        }
        let ratio = step / distance;
        Coordinate3 {
            x: self.x + (target.x - self.x) * ratio,
            y: self.y + (target.y - self.y) * ratio,
            z: self.z + (target.z - self.z) * ratio,
        }
    }
}

impl fmt::Display for Coordinate3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Integer block coordinates. Goal targets compare exactly at this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The corner of the block as a point.
    pub fn as_coordinate(&self) -> Coordinate3 {
        Coordinate3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    pub fn offset(&self, dx: i64, dy: i64, dz: i64) -> BlockPos {
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<BlockPos> for Coordinate3 {
    fn from(pos: BlockPos) -> Self {
        pos.as_coordinate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Coordinate3::new(0.0, 0.0, 0.0);
        let b = Coordinate3::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn block_floors_negative_coordinates() {
        let p = Coordinate3::new(-0.5, 64.9, 10.0);
        assert_eq!(p.block(), BlockPos::new(-1, 64, 10));
    }

    #[test]
    fn step_towards_never_overshoots() {
        let a = Coordinate3::ORIGIN;
        let b = Coordinate3::new(10.0, 0.0, 0.0);
        let mid = a.step_towards(&b, 4.0);
        assert!((mid.x - 4.0).abs() < 1e-9);
        assert_eq!(mid.step_towards(&b, 100.0), b);
    }

    #[test]
    fn display_formats_triplet() {
        assert_eq!(BlockPos::new(100, 64, -3).to_string(), "(100, 64, -3)");
    }
}
