//! Tensor layouts of predictions and ground truth records.

use crate::common::*;

/// Field offsets in a predicted box.
pub mod box_field {
    pub const CX: usize = 0;
    pub const CY: usize = 1;
    pub const W: usize = 2;
    pub const H: usize = 3;
    pub const CONFIDENCE: usize = 4;
    /// The number of entries per predicted box.
    pub const ENTRIES: usize = 5;
}

/// Field offsets in a ground truth record.
pub mod target_field {
    pub const CX: usize = 0;
    pub const CY: usize = 1;
    pub const W: usize = 2;
    pub const H: usize = 3;
    pub const PRESENCE: usize = 4;
    pub const XMIN: usize = 5;
    pub const YMIN: usize = 6;
    pub const XMAX: usize = 7;
    pub const YMAX: usize = 8;
    pub const AREA: usize = 9;
    /// The offset of the first class probability.
    pub const CLASSES: usize = 10;
}

/// The dimensions shared by prediction and ground truth tensors.
///
/// A prediction tensor has shape `[batch, S, S, B * 5 + C]` and a ground truth
/// tensor has shape `[batch, S, S, 10 + C]`, where `S` is `grid_cells`, `B`
/// is `num_boxes` and `C` is `num_classes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, CopyGetters, Serialize, Deserialize)]
pub struct GridLayout {
    #[get_copy = "pub"]
    grid_cells: usize,
    #[get_copy = "pub"]
    num_boxes: usize,
    #[get_copy = "pub"]
    num_classes: usize,
}

impl GridLayout {
    pub fn new(grid_cells: usize, num_boxes: usize, num_classes: usize) -> Result<Self> {
        ensure!(grid_cells > 0, "grid_cells must be positive");
        ensure!(num_boxes > 0, "num_boxes must be positive");
        ensure!(num_classes > 0, "num_classes must be positive");

        Ok(Self {
            grid_cells,
            num_boxes,
            num_classes,
        })
    }

    /// The number of entries per cell in the prediction tensor.
    pub fn prediction_entries(&self) -> usize {
        self.num_boxes * box_field::ENTRIES + self.num_classes
    }

    /// The number of entries per cell in the ground truth tensor.
    pub fn target_entries(&self) -> usize {
        target_field::CLASSES + self.num_classes
    }

    /// The offset of the class scores in a prediction cell.
    pub fn class_offset(&self) -> usize {
        self.num_boxes * box_field::ENTRIES
    }

    /// Verify the prediction tensor shape and return its batch size.
    pub fn check_prediction(&self, prediction: &Tensor) -> Result<usize> {
        self.check_shape(prediction, self.prediction_entries())
            .with_context(|| "invalid prediction tensor")
    }

    /// Verify the ground truth tensor shape and return its batch size.
    pub fn check_target(&self, target: &Tensor) -> Result<usize> {
        self.check_shape(target, self.target_entries())
            .with_context(|| "invalid ground truth tensor")
    }

    /// Verify both tensors and return the common batch size.
    pub fn check_pair(&self, prediction: &Tensor, target: &Tensor) -> Result<usize> {
        let pred_batch = self.check_prediction(prediction)?;
        let target_batch = self.check_target(target)?;
        ensure!(
            pred_batch == target_batch,
            "batch size mismatch: the prediction has {} samples while the ground truth has {}",
            pred_batch,
            target_batch
        );
        Ok(pred_batch)
    }

    /// The flat index of a cell in a `[batch * S * S]` view.
    pub fn flat_cell_index(&self, batch: usize, row: usize, col: usize) -> usize {
        (batch * self.grid_cells + row) * self.grid_cells + col
    }

    fn check_shape(&self, tensor: &Tensor, entries: usize) -> Result<usize> {
        let size = tensor.size();
        let s = self.grid_cells as i64;
        let e = entries as i64;

        match size.as_slice() {
            &[batch, rows, cols, ents] => {
                ensure!(
                    rows == s && cols == s && ents == e,
                    "expect shape [_, {}, {}, {}], but get {:?}",
                    s,
                    s,
                    e,
                    size
                );
                Ok(batch as usize)
            }
            _ => bail!("expect a 4-dimensional tensor, but get shape {:?}", size),
        }
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            grid_cells: 7,
            num_boxes: 2,
            num_classes: 20,
        }
    }
}
