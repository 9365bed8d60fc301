use std::iter::FusedIterator;

use crate::geometry::{ScreenBlock, ScreenPoint};

pub trait ScreenBlockExt {
    fn internal_points(&self) -> InternalPoints;
    fn tiles(&self, tile_size: u32) -> Tiles;
}

impl ScreenBlockExt for ScreenBlock {
    /// Create an iterator over coordinates (x, y) pairs inside the block,
    /// in C order (x changes first, then y)
    fn internal_points(&self) -> InternalPoints {
        if self.is_empty() {
            InternalPoints::empty()
        } else {
            InternalPoints {
                min_x: self.min.x,
                max: self.max,

                cursor: self.min,
            }
        }
    }

    /// Create an iterator over tile_size * tile_size sub blocks in row major order.
    /// Tiles on the right and bottom edge are clipped to the block.
    /// Tile size must be non zero.
    fn tiles(&self, tile_size: u32) -> Tiles {
        assert!(tile_size > 0);

        if self.is_empty() {
            return Tiles::empty();
        }

        Tiles {
            block: *self,
            tile_size,
            columns: self.width().div_ceil(tile_size),
            index: 0,
            count: self.width().div_ceil(tile_size) * self.height().div_ceil(tile_size),
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct InternalPoints {
    min_x: u32,
    max: ScreenPoint,

    cursor: ScreenPoint,
}

impl InternalPoints {
    // Construct an iterator over internal points that returns no points
    fn empty() -> Self {
        InternalPoints {
            min_x: 1,
            max: ScreenPoint::origin(),

            cursor: ScreenPoint::origin(),
        }
    }
}

impl Iterator for InternalPoints {
    type Item = ScreenPoint;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.y >= self.max.y {
            return None;
        }

        let ret = self.cursor;

        debug_assert!(self.cursor.x < self.max.x);
        self.cursor.x += 1;
        if self.cursor.x >= self.max.x {
            self.cursor.x = self.min_x;
            self.cursor.y += 1;
        }

        Some(ret)
    }
}

impl ExactSizeIterator for InternalPoints {
    fn len(&self) -> usize {
        if self.cursor.y >= self.max.y {
            0
        } else {
            let whole_rows = ScreenBlock::new(ScreenPoint::new(self.min_x, self.cursor.y + 1), self.max);
            let current_row = ScreenBlock::new(self.cursor, ScreenPoint::new(self.max.x, self.cursor.y + 1));
            (whole_rows.area() + current_row.area()) as usize
        }
    }
}

impl FusedIterator for InternalPoints {}

/// Iterator over square tiles of a block, row by row.
#[derive(Copy, Clone, Debug)]
pub struct Tiles {
    block: ScreenBlock,
    tile_size: u32,
    columns: u32,

    index: u32,
    count: u32,
}

impl Tiles {
    /// Constructs an iterator that returns no blocks.
    fn empty() -> Tiles {
        Tiles {
            block: ScreenBlock::new(ScreenPoint::origin(), ScreenPoint::origin()),
            tile_size: 1,
            columns: 0,
            index: 0,
            count: 0,
        }
    }
}

impl Iterator for Tiles {
    type Item = ScreenBlock;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }

        let column = self.index % self.columns;
        let row = self.index / self.columns;
        self.index += 1;

        let min = ScreenPoint::new(
            self.block.min.x + column * self.tile_size,
            self.block.min.y + row * self.tile_size,
        );
        let max = ScreenPoint::new(
            (min.x + self.tile_size).min(self.block.max.x),
            (min.y + self.tile_size).min(self.block.max.y),
        );
        debug_assert!(min.x < max.x && min.y < max.y);

        Some(ScreenBlock::new(min, max))
    }
}

impl ExactSizeIterator for Tiles {
    fn len(&self) -> usize {
        (self.count - self.index) as usize
    }
}

impl FusedIterator for Tiles {}
