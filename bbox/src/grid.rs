//! Grid geometry and the IoU of grid-relative predictions.

use super::{CyCxHW, RectFloat, RectNum, TLBR};
use crate::common::*;

/// The default input image size in pixels.
pub const DEFAULT_IMAGE_SIZE: usize = 448;
/// The default number of cells along each grid side.
pub const DEFAULT_GRID_CELLS: usize = 7;

/// The pixel geometry of a square detection grid laid over a square image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    image_size: f64,
    cell_size: f64,
}

impl GridGeometry {
    /// Partition an image of `image_size` pixels into `grid_cells` × `grid_cells` cells.
    pub fn new(image_size: usize, grid_cells: usize) -> Result<Self> {
        ensure!(grid_cells > 0, "grid_cells must be positive");
        ensure!(image_size > 0, "image_size must be positive");
        ensure!(
            image_size % grid_cells == 0,
            "image_size {} is not divisible by grid_cells {}",
            image_size,
            grid_cells
        );

        Ok(Self {
            image_size: image_size as f64,
            cell_size: (image_size / grid_cells) as f64,
        })
    }

    pub fn image_size(&self) -> f64 {
        self.image_size
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn grid_cells(&self) -> usize {
        (self.image_size / self.cell_size).round() as usize
    }

    /// The pixel position of the top-left corner of a cell in `[x, y]` order.
    pub fn cell_origin(&self, cell: GridCell) -> [f64; 2] {
        [
            cell.col as f64 * self.cell_size,
            cell.row as f64 * self.cell_size,
        ]
    }

    /// The valid pixel range of the image. The far edge is the last pixel
    /// index, so a box never extends past `image_size - 1`.
    pub fn image_bounds(&self) -> TLBR<f64> {
        let last = self.image_size - 1.0;
        TLBR {
            t: 0.0,
            l: 0.0,
            b: last,
            r: last,
        }
    }

    /// Find the cell containing the box center and encode the box relative to it.
    ///
    /// Returns `None` if the center lies outside the image.
    pub fn locate<R>(&self, bbox: &R) -> Option<(GridCell, GridBox)>
    where
        R: RectNum<Type = f64>,
    {
        let CyCxHW { cy, cx, h, w } = bbox.to_cycxhw();
        if !(0.0..self.image_size).contains(&cy) || !(0.0..self.image_size).contains(&cx) {
            return None;
        }

        let row = (cy / self.cell_size).floor() as usize;
        let col = (cx / self.cell_size).floor() as usize;
        let cell = GridCell { row, col };
        let grid_box = GridBox {
            cx: cx / self.cell_size - col as f64,
            cy: cy / self.cell_size - row as f64,
            w: w / self.image_size,
            h: h / self.image_size,
        };

        Some((cell, grid_box))
    }
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_SIZE, DEFAULT_GRID_CELLS).unwrap()
    }
}

/// The position of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

/// Box parameters encoded relative to a grid cell.
///
/// `cx`, `cy` are offsets from the cell's top-left corner in cell units,
/// `w`, `h` are normalized by the image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl GridBox {
    /// Reconstruct the absolute box clipped to the image.
    ///
    /// The center and size are truncated to whole pixels before the corners
    /// are derived.
    pub fn to_pixel_tlbr(&self, origin: [f64; 2], geometry: &GridGeometry) -> TLBR<f64> {
        let [origin_x, origin_y] = origin;
        let cell_size = geometry.cell_size();
        let image_size = geometry.image_size();

        let abs_x = (origin_x + self.cx * cell_size).trunc();
        let abs_y = (origin_y + self.cy * cell_size).trunc();
        let abs_w = (self.w * image_size).trunc();
        let abs_h = (self.h * image_size).trunc();

        let unclipped = TLBR {
            t: abs_y - abs_h / 2.0,
            l: abs_x - abs_w / 2.0,
            b: abs_y + abs_h / 2.0,
            r: abs_x + abs_w / 2.0,
        };
        unclipped.clip_to(&geometry.image_bounds())
    }

    /// Compute the IoU of this prediction against a pixel-space target box.
    pub fn iou_with(&self, target: &TLBR<f64>, origin: [f64; 2], geometry: &GridGeometry) -> f64 {
        self.to_pixel_tlbr(origin, geometry).iou_with(target)
    }
}

/// Compute the IoU between a grid-relative prediction in the cell at
/// `(cell_origin_x, cell_origin_y)` and a ground truth box in pixels.
pub fn compute_iou(
    predicted: &GridBox,
    ground_truth: &TLBR<f64>,
    cell_origin_x: f64,
    cell_origin_y: f64,
    geometry: &GridGeometry,
) -> f64 {
    predicted.iou_with(ground_truth, [cell_origin_x, cell_origin_y], geometry)
}
