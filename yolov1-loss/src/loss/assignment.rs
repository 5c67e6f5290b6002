use crate::{common::*, target::CellTarget};
use bbox::{GridBox, GridCell, GridGeometry};

/// A candidate box predicted by one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredBox {
    /// The position of the box among the cell's candidates.
    pub index: usize,
    pub grid_box: GridBox,
    pub confidence: f64,
}

/// The role of a candidate box in one forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment {
    /// The responsible box of an object cell, with its IoU against the
    /// ground truth.
    Positive { pred: PredBox, iou: f64 },
    /// A box whose confidence is pushed toward zero. The IoU is present for
    /// boxes of object cells.
    Negative { pred: PredBox, iou: Option<f64> },
}

impl Assignment {
    pub fn pred(&self) -> &PredBox {
        match self {
            Self::Positive { pred, .. } => pred,
            Self::Negative { pred, .. } => pred,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive { .. })
    }
}

/// The assignments of all candidates in one grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellAssignment {
    pub batch_index: usize,
    pub cell: GridCell,
    pub assignments: Vec<Assignment>,
}

impl CellAssignment {
    /// True if the cell contains an object.
    pub fn is_object(&self) -> bool {
        self.positive().is_some()
    }

    /// The responsible box and its IoU.
    pub fn positive(&self) -> Option<(&PredBox, f64)> {
        self.assignments.iter().find_map(|assignment| match assignment {
            Assignment::Positive { pred, iou } => Some((pred, *iou)),
            Assignment::Negative { .. } => None,
        })
    }

    pub fn negatives(&self) -> impl Iterator<Item = &PredBox> {
        self.assignments
            .iter()
            .filter(|assignment| !assignment.is_positive())
            .map(|assignment| assignment.pred())
    }
}

/// Decide the role of each candidate box of a cell.
///
/// In a background cell every box is negative. In an object cell the box with
/// the greatest IoU is positive. A later box wins ties, so for two boxes the
/// first one is responsible only when its IoU is strictly greater.
pub fn assign_boxes(
    preds: &[PredBox],
    target: &CellTarget,
    cell_origin: [f64; 2],
    geometry: &GridGeometry,
) -> Vec<Assignment> {
    if target.is_background() {
        return preds
            .iter()
            .map(|&pred| Assignment::Negative { pred, iou: None })
            .collect();
    }

    let ious: Vec<f64> = preds
        .iter()
        .map(|pred| pred.grid_box.iou_with(&target.tlbr, cell_origin, geometry))
        .collect();

    let responsible = ious
        .iter()
        .enumerate()
        .skip(1)
        .fold(0, |best, (index, &iou)| {
            if ious[best] > iou {
                best
            } else {
                index
            }
        });

    preds
        .iter()
        .zip(ious)
        .map(|(&pred, iou)| {
            if pred.index == preds[responsible].index {
                Assignment::Positive { pred, iou }
            } else {
                Assignment::Negative {
                    pred,
                    iou: Some(iou),
                }
            }
        })
        .collect()
}
