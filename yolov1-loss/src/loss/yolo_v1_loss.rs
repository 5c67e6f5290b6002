//! The YOLO v1 training loss.

use super::{
    assign_boxes, Assignment, BackgroundWeighting, CellAssignment, LossWeights, PredBox,
    YoloV1LossAuxiliary, YoloV1LossOutput,
};
use crate::{
    common::*,
    layout::{box_field, target_field, GridLayout},
    profiling::Timing,
    target::CellTarget,
};
use bbox::{GridBox, GridCell, GridGeometry, DEFAULT_GRID_CELLS, DEFAULT_IMAGE_SIZE};
use itertools::iproduct;

const SQRT_EPSILON: f64 = 1e-8;

/// The initializer of [YoloV1Loss].
#[derive(Debug, Clone)]
pub struct YoloV1LossInit {
    pub grid_cells: usize,
    pub num_boxes: usize,
    pub num_classes: usize,
    pub image_size: usize,
    pub background_weighting: BackgroundWeighting,
}

impl YoloV1LossInit {
    pub fn build(self) -> Result<YoloV1Loss> {
        let Self {
            grid_cells,
            num_boxes,
            num_classes,
            image_size,
            background_weighting,
        } = self;

        let layout = GridLayout::new(grid_cells, num_boxes, num_classes)?;
        let geometry = GridGeometry::new(image_size, grid_cells)?;

        Ok(YoloV1Loss {
            layout,
            geometry,
            background_weighting,
        })
    }
}

impl Default for YoloV1LossInit {
    fn default() -> Self {
        Self {
            grid_cells: DEFAULT_GRID_CELLS,
            num_boxes: 2,
            num_classes: 20,
            image_size: DEFAULT_IMAGE_SIZE,
            background_weighting: BackgroundWeighting::default(),
        }
    }
}

#[derive(Debug, Clone, CopyGetters)]
pub struct YoloV1Loss {
    #[get_copy = "pub"]
    layout: GridLayout,
    #[get_copy = "pub"]
    geometry: GridGeometry,
    #[get_copy = "pub"]
    background_weighting: BackgroundWeighting,
}

impl YoloV1Loss {
    /// Compute the loss of a mini-batch.
    ///
    /// `prediction` has shape `[batch, S, S, B * 5 + C]` and `target` has
    /// shape `[batch, S, S, 10 + C]`. The returned terms are summed over the
    /// batch. The diagnostics are read from the same tensors.
    pub fn forward(
        &self,
        prediction: &Tensor,
        target: &Tensor,
        weights: LossWeights,
    ) -> Result<(YoloV1LossOutput, YoloV1LossAuxiliary)> {
        let mut timing = Timing::new("yolo_v1_loss");

        self.layout.check_pair(prediction, target)?;
        let device = prediction.device();
        let kind = prediction.kind();

        // decide responsible boxes from detached values
        let assignments = self.assign(prediction, target)?;
        timing.add_event("assign");

        let indexes = ResponsibilityIndexes::new(
            &self.layout,
            self.background_weighting,
            &weights,
            &assignments,
        );
        let index_tensor = |values: &[i64]| Tensor::of_slice(values).to_device(device);
        let value_tensor =
            |values: &[f64]| Tensor::of_slice(values).to_kind(kind).to_device(device);
        timing.add_event("collect_indexes");

        let num_boxes = self.layout.num_boxes() as i64;
        let num_classes = self.layout.num_classes() as i64;
        let class_offset = self.layout.class_offset() as i64;

        let pred_boxes = prediction
            .narrow(3, 0, num_boxes * box_field::ENTRIES as i64)
            .reshape(&[-1, box_field::ENTRIES as i64]);
        let pred_classes = prediction
            .narrow(3, class_offset, num_classes)
            .reshape(&[-1, num_classes]);
        let target_records = target
            .reshape(&[-1, self.layout.target_entries() as i64])
            .to_kind(kind);

        let positive_rows = index_tensor(&indexes.positive_boxes);
        let object_cells = index_tensor(&indexes.object_cells);
        let positive_boxes = pred_boxes.index_select(0, &positive_rows);
        let object_records = target_records.index_select(0, &object_cells);

        let coord_loss = {
            let pred_cxcy = positive_boxes.narrow(1, box_field::CX as i64, 2);
            let target_cxcy = object_records.narrow(1, target_field::CX as i64, 2);
            let pred_wh = positive_boxes.narrow(1, box_field::W as i64, 2);
            let target_wh = object_records.narrow(1, target_field::W as i64, 2);

            let center_loss = (pred_cxcy - target_cxcy).square().sum(kind);
            let size_loss = ((pred_wh + SQRT_EPSILON).sqrt() - (target_wh + SQRT_EPSILON).sqrt())
                .square()
                .sum(kind);
            (center_loss + size_loss) * weights.coord
        };
        timing.add_event("coord_loss");

        let confidence_loss = {
            let positive_loss = {
                let confidence = positive_boxes.select(1, box_field::CONFIDENCE as i64);
                let ious = value_tensor(&indexes.positive_ious);
                (confidence - ious).square().sum(kind)
            };

            let negative_loss = {
                let rows = index_tensor(&indexes.negative_boxes);
                let confidence = pred_boxes
                    .index_select(0, &rows)
                    .select(1, box_field::CONFIDENCE as i64);
                confidence.square().sum(kind) * weights.noobj
            };

            let background_loss = {
                let rows = index_tensor(&indexes.background_boxes);
                let box_weights = value_tensor(&indexes.background_weights);
                let confidence = pred_boxes
                    .index_select(0, &rows)
                    .select(1, box_field::CONFIDENCE as i64);
                (confidence.square() * box_weights).sum(kind)
            };

            positive_loss + negative_loss + background_loss
        };
        timing.add_event("confidence_loss");

        let classification_loss = {
            let pred_probs = pred_classes.index_select(0, &object_cells);
            let target_probs = object_records.narrow(1, target_field::CLASSES as i64, num_classes);
            (pred_probs - target_probs)
                .square()
                .mean_dim(&[1], false, kind)
                .sum(kind)
        };
        timing.add_event("classification_loss");

        let total_loss = &coord_loss + &confidence_loss + &classification_loss;
        timing.add_event("sum_losses");

        let output = YoloV1LossOutput {
            total_loss,
            coord_loss,
            confidence_loss,
            classification_loss,
        };

        let iou_sum: f64 = assignments
            .iter()
            .filter_map(|cell| cell.positive())
            .map(|(_, iou)| iou)
            .sum();
        let num_objects = indexes.object_cells.len();
        let diagnostics = output.diagnostics(iou_sum, num_objects);
        if !diagnostics.is_finite() {
            warn!("non-finite loss detected: {}", diagnostics);
        }

        timing.report();

        Ok((
            output,
            YoloV1LossAuxiliary {
                diagnostics,
                assignments,
            },
        ))
    }

    /// Assign the role of every predicted box in the batch.
    ///
    /// The result is ordered by batch, row and column. It depends only on
    /// the tensor values and never carries gradient.
    pub fn assign(&self, prediction: &Tensor, target: &Tensor) -> Result<Vec<CellAssignment>> {
        let batch_size = self.layout.check_pair(prediction, target)?;
        let s = self.layout.grid_cells();
        let num_boxes = self.layout.num_boxes();

        let pred_values = detached_values(prediction);
        let target_values = detached_values(target);
        let pred_array = ArrayView4::from_shape(
            (batch_size, s, s, self.layout.prediction_entries()),
            &pred_values,
        )?;
        let target_array = ArrayView4::from_shape(
            (batch_size, s, s, self.layout.target_entries()),
            &target_values,
        )?;

        let assignments: Vec<_> = iproduct!(0..batch_size, 0..s, 0..s)
            .map(|(batch_index, row, col)| {
                let cell = GridCell { row, col };
                let cell_target = CellTarget::from_record(
                    target_array.slice(ndarray::s![batch_index, row, col, ..]),
                );
                let record = pred_array.slice(ndarray::s![batch_index, row, col, ..]);
                let preds: Vec<_> = (0..num_boxes)
                    .map(|index| {
                        let field =
                            |offset: usize| record[index * box_field::ENTRIES + offset];
                        PredBox {
                            index,
                            grid_box: GridBox {
                                cx: field(box_field::CX),
                                cy: field(box_field::CY),
                                w: field(box_field::W),
                                h: field(box_field::H),
                            },
                            confidence: field(box_field::CONFIDENCE),
                        }
                    })
                    .collect();

                let assignments = assign_boxes(
                    &preds,
                    &cell_target,
                    self.geometry.cell_origin(cell),
                    &self.geometry,
                );

                CellAssignment {
                    batch_index,
                    cell,
                    assignments,
                }
            })
            .collect();

        debug!(
            "assigned {} object cells out of {}",
            assignments.iter().filter(|cell| cell.is_object()).count(),
            assignments.len()
        );

        Ok(assignments)
    }
}

/// Copy the tensor values to host memory without gradient tracking.
///
/// Values are widened to `f64` so that pixel truncation sees the same
/// numbers for float and double inputs.
fn detached_values(tensor: &Tensor) -> Vec<f64> {
    let values = tch::no_grad(|| {
        tensor
            .detach()
            .to_device(Device::Cpu)
            .to_kind(Kind::Double)
            .reshape(&[-1])
    });
    Vec::<f64>::from(&values)
}

/// Flat row indexes of boxes and cells grouped by their loss terms.
///
/// Box rows index a `[batch * S * S * B, 5]` view and cell rows index a
/// `[batch * S * S, _]` view.
#[derive(Debug, Default)]
struct ResponsibilityIndexes {
    positive_boxes: Vec<i64>,
    positive_ious: Vec<f64>,
    object_cells: Vec<i64>,
    negative_boxes: Vec<i64>,
    background_boxes: Vec<i64>,
    background_weights: Vec<f64>,
}

impl ResponsibilityIndexes {
    fn new(
        layout: &GridLayout,
        background_weighting: BackgroundWeighting,
        weights: &LossWeights,
        assignments: &[CellAssignment],
    ) -> Self {
        let num_boxes = layout.num_boxes();
        let mut indexes = Self::default();

        assignments.iter().for_each(|cell_assignment| {
            let CellAssignment {
                batch_index,
                cell: GridCell { row, col },
                ref assignments,
            } = *cell_assignment;
            let cell_index = layout.flat_cell_index(batch_index, row, col);
            let box_row = |pred: &PredBox| (cell_index * num_boxes + pred.index) as i64;

            if cell_assignment.is_object() {
                indexes.object_cells.push(cell_index as i64);
            }

            assignments.iter().for_each(|assignment| match *assignment {
                Assignment::Positive { ref pred, iou } => {
                    indexes.positive_boxes.push(box_row(pred));
                    indexes.positive_ious.push(iou);
                }
                Assignment::Negative {
                    ref pred,
                    iou: Some(_),
                } => {
                    indexes.negative_boxes.push(box_row(pred));
                }
                Assignment::Negative {
                    ref pred,
                    iou: None,
                } => {
                    indexes.background_boxes.push(box_row(pred));
                    indexes
                        .background_weights
                        .push(background_weighting.box_weight(pred.index, weights));
                }
            });
        });

        indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn small_loss(background_weighting: BackgroundWeighting) -> YoloV1Loss {
        YoloV1LossInit {
            grid_cells: 2,
            num_boxes: 2,
            num_classes: 1,
            image_size: 4,
            background_weighting,
        }
        .build()
        .unwrap()
    }

    /// A `[1, 2, 2, 11]` prediction and target pair with an object in cell (0, 0).
    fn object_scenario() -> (Tensor, Tensor) {
        let mut pred = vec![0f32; 2 * 2 * 11];
        pred[0..11].copy_from_slice(&[
            0.5, 0.5, 0.5, 0.5, 0.5, // box 1
            0.5, 0.5, 0.5, 0.5, 0.5, // box 2
            1.0, // class
        ]);
        let mut target = vec![0f32; 2 * 2 * 11];
        target[0..11].copy_from_slice(&[
            0.5, 0.5, 0.5, 0.5, 1.0, // cx, cy, w, h, presence
            0.0, 0.0, 2.0, 2.0, 4.0, // xmin, ymin, xmax, ymax, area
            1.0, // class
        ]);

        (
            Tensor::of_slice(&pred).view([1, 2, 2, 11]),
            Tensor::of_slice(&target).view([1, 2, 2, 11]),
        )
    }

    #[test]
    fn reject_invalid_init() {
        assert!(YoloV1LossInit {
            grid_cells: 0,
            ..Default::default()
        }
        .build()
        .is_err());
        assert!(YoloV1LossInit {
            num_boxes: 0,
            ..Default::default()
        }
        .build()
        .is_err());
        assert!(YoloV1LossInit {
            image_size: 100,
            ..Default::default()
        }
        .build()
        .is_err());
    }

    #[test]
    fn object_cell_scenario() -> Result<()> {
        let loss = small_loss(BackgroundWeighting::FirstBoxOnly);
        let (prediction, target) = object_scenario();
        let (output, aux) = loss.forward(&prediction, &target, LossWeights::default())?;

        let diagnostics = aux.diagnostics;
        assert_eq!(diagnostics.num_objects, 1);
        assert_abs_diff_eq!(diagnostics.mean_iou().unwrap(), 1.0);
        assert_abs_diff_eq!(diagnostics.coord_loss, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(diagnostics.classification_loss, 0.0);

        // (0.5 - 1)^2 for the responsible box, 0.5 * 0.5^2 for the other box
        assert_abs_diff_eq!(diagnostics.confidence_loss, 0.375, epsilon = 1e-6);
        assert_abs_diff_eq!(
            f64::from(&output.total_loss.detach()),
            diagnostics.total_loss,
            epsilon = 1e-9
        );

        // equal IoUs favor the second box
        let first_cell = &aux.assignments[0];
        let (positive, _) = first_cell.positive().unwrap();
        assert_eq!(positive.index, 1);
        Ok(())
    }

    #[test]
    fn all_background_batch() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(3);
        let confidences: Vec<f32> = (0..8).map(|_| rng.gen_range(0.0..1.0)).collect();

        let mut pred = vec![0f32; 2 * 2 * 2 * 11];
        pred.chunks_mut(11)
            .zip(confidences.chunks(2))
            .for_each(|(record, conf)| {
                record[box_field::CONFIDENCE] = conf[0];
                record[box_field::ENTRIES + box_field::CONFIDENCE] = conf[1];
            });
        let prediction = Tensor::of_slice(&pred).view([2, 2, 2, 11]);
        let target = Tensor::zeros(&[2, 2, 2, 11], (Kind::Float, Device::Cpu));
        let weights = LossWeights::default();

        let legacy = {
            let (_, aux) = small_loss(BackgroundWeighting::FirstBoxOnly).forward(
                &prediction,
                &target,
                weights,
            )?;
            aux.diagnostics
        };
        let expect: f64 = confidences
            .chunks(2)
            .map(|conf| 0.5 * (conf[0] as f64).powi(2) + (conf[1] as f64).powi(2))
            .sum();
        assert_abs_diff_eq!(legacy.total_loss, expect, epsilon = 1e-5);
        assert_eq!(legacy.num_objects, 0);
        assert_eq!(legacy.mean_iou(), None);
        assert_eq!(legacy.coord_loss, 0.0);
        assert_eq!(legacy.classification_loss, 0.0);

        let uniform = {
            let (_, aux) = small_loss(BackgroundWeighting::AllBoxes).forward(
                &prediction,
                &target,
                weights,
            )?;
            aux.diagnostics
        };
        let expect: f64 = confidences
            .iter()
            .map(|&conf| 0.5 * (conf as f64).powi(2))
            .sum();
        assert_abs_diff_eq!(uniform.total_loss, expect, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn coordinate_term_uses_square_roots() -> Result<()> {
        let loss = small_loss(BackgroundWeighting::FirstBoxOnly);
        let (prediction, target) = object_scenario();

        // move both boxes so that the second one stays responsible
        let prediction = {
            let mut values = Vec::<f32>::from(&prediction.reshape(&[-1]));
            values[0..4].copy_from_slice(&[0.0, 0.0, 0.0, 0.0]);
            values[5..9].copy_from_slice(&[0.25, 0.75, 0.25, 0.25]);
            Tensor::of_slice(&values).view([1, 2, 2, 11])
        };

        let (_, aux) = loss.forward(&prediction, &target, LossWeights::new(2.0, 0.5)?)?;
        let (positive, _) = aux.assignments[0].positive().unwrap();
        assert_eq!(positive.index, 1);

        let sqrt = |value: f64| (value + SQRT_EPSILON).sqrt();
        let expect = 2.0
            * (0.25f64.powi(2)
                + 0.25f64.powi(2)
                + 2.0 * (sqrt(0.25) - sqrt(0.5)).powi(2));
        assert_abs_diff_eq!(aux.diagnostics.coord_loss, expect, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn double_prediction_truncates_at_full_precision() -> Result<()> {
        let loss = small_loss(BackgroundWeighting::FirstBoxOnly);
        let (_, target) = object_scenario();

        // cx * cell_size lies just below pixel 1 and rounds up to 0.5 in f32
        let mut pred = vec![0f64; 2 * 2 * 11];
        pred[0..5].copy_from_slice(&[0.5 - 1e-12, 0.5, 0.5, 0.5, 0.5]);
        let double = Tensor::of_slice(&pred).view([1, 2, 2, 11]);
        let float = double.to_kind(Kind::Float);

        let assignments = loss.assign(&double, &target)?;
        let (positive, iou) = assignments[0].positive().unwrap();
        assert_eq!(positive.index, 0);
        // left 0, right 1, top 0, bottom 2 against the 2x2 ground truth
        assert_abs_diff_eq!(iou, 0.5);

        let assignments = loss.assign(&float, &target)?;
        let (_, iou) = assignments[0].positive().unwrap();
        assert_abs_diff_eq!(iou, 1.0);

        let (_, aux) = loss.forward(&double, &target, LossWeights::default())?;
        assert_abs_diff_eq!(aux.diagnostics.iou_sum, 0.5);
        Ok(())
    }

    #[test]
    fn gradient_reaches_prediction() -> Result<()> {
        let loss = small_loss(BackgroundWeighting::FirstBoxOnly);
        let (prediction, target) = object_scenario();
        let prediction = prediction.set_requires_grad(true);

        let (output, _) = loss.forward(&prediction, &target, LossWeights::default())?;
        output.total_loss.backward();

        let grad = prediction.grad();
        assert_eq!(grad.size(), vec![1, 2, 2, 11]);
        // d/dc (c - 1)^2 = -1 at c = 0.5 for the responsible box
        let responsible_conf =
            f64::from(&grad.i((0, 0, 0, box_field::ENTRIES as i64 + 4)));
        assert_abs_diff_eq!(responsible_conf, -1.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn reject_mismatched_shapes() {
        let loss = small_loss(BackgroundWeighting::FirstBoxOnly);
        let (prediction, target) = object_scenario();
        let wrong_target = Tensor::zeros(&[1, 2, 2, 10], (Kind::Float, Device::Cpu));
        assert!(loss
            .forward(&prediction, &wrong_target, LossWeights::default())
            .is_err());

        let other_batch = Tensor::zeros(&[2, 2, 2, 11], (Kind::Float, Device::Cpu));
        assert!(loss
            .forward(&prediction, &other_batch, LossWeights::default())
            .is_err());
        assert!(loss.forward(&prediction, &target, LossWeights::default()).is_ok());
    }
}
