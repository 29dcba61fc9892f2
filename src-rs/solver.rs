//! Grid solvers: two geometric mappings from detector output to tile indices.
//!
//! The 3x3 grids use a centroid mapping (each detection claims the cell under
//! its bounding-box center). The 4x4 squares grid uses an overlap mapping:
//! every cell touched by a bounding-box corner plus every cell inside the
//! row/column span of those corners, since an object can cross a cell's
//! interior without dropping a corner into it.

use std::collections::BTreeSet;

use crate::challenge::{TargetClass, Variant};

/// Axis-aligned box in pixel coordinates of the challenge image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn centroid(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// The four corners, clockwise from top-left.
    pub fn corners(&self) -> [(f32, f32); 4] {
        [
            (self.x1, self.y1),
            (self.x2, self.y1),
            (self.x2, self.y2),
            (self.x1, self.y2),
        ]
    }
}

/// One classified bounding box from the object detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: u32, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Detection {
            class_id,
            bbox: BoundingBox { x1, y1, x2, y2 },
        }
    }
}

/// Cell edge length of the 3x3 grid over a 300 px image.
const SELECTION_CELL: f32 = 100.0;
/// Cell edge length of the 4x4 grid over a 450 px image.
const SQUARES_CELL: f32 = 112.5;

fn cell_coord(value: f32, cell: f32, grid: u32) -> u32 {
    let idx = (value / cell).floor() as i64;
    idx.clamp(0, i64::from(grid) - 1) as u32
}

/// Maps detections of `target` onto the 3x3 grid by bounding-box centroid.
///
/// Tile indices are 1-based and row-major; duplicates collapse, and the set
/// iterates in ascending order for clicking determinism.
pub fn centroid_tiles(detections: &[Detection], target: TargetClass) -> BTreeSet<u32> {
    let mut tiles = BTreeSet::new();
    for det in detections.iter().filter(|d| d.class_id == target.class_id()) {
        let (xc, yc) = det.bbox.centroid();
        let row = cell_coord(yc, SELECTION_CELL, 3);
        let col = cell_coord(xc, SELECTION_CELL, 3);
        tiles.insert(row * 3 + col + 1);
    }
    tiles
}

/// Maps detections of `target` onto the 4x4 grid by corner overlap.
///
/// For each detection, the cells touched by its four corners define a
/// row/column span; every cell inside that span rectangle is occupied, not
/// just the corner cells. Results union across detections.
pub fn overlap_tiles(detections: &[Detection], target: TargetClass) -> BTreeSet<u32> {
    let mut tiles = BTreeSet::new();
    for det in detections.iter().filter(|d| d.class_id == target.class_id()) {
        let mut min_row = u32::MAX;
        let mut max_row = 0;
        let mut min_col = u32::MAX;
        let mut max_col = 0;
        for (x, y) in det.bbox.corners() {
            let row = cell_coord(y, SQUARES_CELL, 4);
            let col = cell_coord(x, SQUARES_CELL, 4);
            min_row = min_row.min(row);
            max_row = max_row.max(row);
            min_col = min_col.min(col);
            max_col = max_col.max(col);
        }
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                tiles.insert(row * 4 + col + 1);
            }
        }
    }
    tiles
}

/// Runs the mapper matching the challenge variant.
pub fn solve_grid(
    detections: &[Detection],
    target: TargetClass,
    variant: Variant,
) -> BTreeSet<u32> {
    match variant {
        Variant::Selection | Variant::Dynamic => centroid_tiles(detections, target),
        Variant::Squares => overlap_tiles(detections, target),
    }
}

/// Confidence floor: a mapping too sparse (or covering the whole squares
/// grid) is judged a detection failure and the challenge is reloaded.
pub fn judged_solved(variant: Variant, tile_count: usize) -> bool {
    match variant {
        Variant::Selection | Variant::Dynamic => tile_count >= 3,
        Variant::Squares => (1..=15).contains(&tile_count),
    }
}
