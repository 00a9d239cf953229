//! Nearest-bed search.

use std::collections::BTreeSet;

use crate::geometry::BlockPos;
use crate::world::{BlockKind, BlockView};

/// Box search for bed blocks around a point.
pub struct BedLocator;

impl BedLocator {
    /// Finds the bed closest to `origin` within `horizontal` blocks on X/Z and
    /// `vertical` blocks on Y.
    ///
    /// Returns the nearest bed block plus its other half when the other half
    /// is a horizontal neighbour, so one or two blocks. `None` when no bed
    /// block is in range.
    pub fn find_nearest(
        view: &impl BlockView,
        origin: BlockPos,
        horizontal: i32,
        vertical: i32,
    ) -> Option<BTreeSet<BlockPos>> {
        let horizontal = horizontal.max(0);
        let vertical = vertical.max(0);

        let mut nearest: Option<(i64, BlockPos)> = None;
        for dx in -horizontal..=horizontal {
            for dy in -vertical..=vertical {
                for dz in -horizontal..=horizontal {
                    let pos = origin.offset(dx, dy, dz);
                    if view.block_at(pos) != BlockKind::Bed {
                        continue;
                    }
                    let dist = origin.distance_squared(pos);
                    // Strict comparison keeps the first block in scan order on ties.
                    if nearest.is_none_or(|(best, _)| dist < best) {
                        nearest = Some((dist, pos));
                    }
                }
            }
        }

        let (_, head) = nearest?;
        let mut blocks = BTreeSet::from([head]);
        if let Some(other) = head
            .horizontal_neighbors()
            .into_iter()
            .find(|n| view.block_at(*n) == BlockKind::Bed)
        {
            blocks.insert(other);
        }
        Some(blocks)
    }
}
