//! Block coordinates and distance helpers.

use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Integer block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Creates a new block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The block containing a continuous world position.
    pub fn containing(pos: DVec3) -> Self {
        Self {
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }

    /// Center of the block in world space.
    pub fn center(self) -> DVec3 {
        DVec3::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 0.5,
            f64::from(self.z) + 0.5,
        )
    }

    /// Returns this position shifted by the given offsets.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The four horizontally adjacent positions (a two-block bed lies along one of them).
    pub fn horizontal_neighbors(self) -> [Self; 4] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }

    /// Squared distance between block centers.
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        let dz = i64::from(self.z - other.z);
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

/// Distance from `pos` to the center of the nearest block in `blocks`.
///
/// Returns `None` when `blocks` is empty.
pub fn nearest_block_distance<'a>(
    pos: DVec3,
    blocks: impl IntoIterator<Item = &'a BlockPos>,
) -> Option<f64> {
    blocks
        .into_iter()
        .map(|block| block.center().distance(pos))
        .min_by(f64::total_cmp)
}
