use super::{BackgroundWeighting, LossWeights, WeightScheduleInit, YoloV1LossInit};
use crate::common::*;

/// The loss function configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossConfig {
    /// The number of grid cells per side.
    pub grid_cells: Option<usize>,
    /// The number of predicted boxes per cell.
    pub num_boxes: Option<usize>,
    /// The number of classes.
    pub num_classes: Option<usize>,
    /// The side length of the square input image in pixels.
    pub image_size: Option<usize>,
    /// The initial weight factor of the localization loss.
    pub coord_weight: Option<R64>,
    /// The initial weight factor of the negative confidence loss.
    pub noobj_weight: Option<R64>,
    /// The last epoch trained with the initial weights.
    pub epoch_threshold: Option<usize>,
    /// The weighting of background cell confidences.
    pub background_weighting: Option<BackgroundWeighting>,
}

impl LossConfig {
    pub fn yolo_v1_loss_init(&self) -> YoloV1LossInit {
        let Self {
            grid_cells,
            num_boxes,
            num_classes,
            image_size,
            background_weighting,
            ..
        } = *self;

        let mut init = YoloV1LossInit::default();

        if let Some(grid_cells) = grid_cells {
            init.grid_cells = grid_cells;
        }

        if let Some(num_boxes) = num_boxes {
            init.num_boxes = num_boxes;
        }

        if let Some(num_classes) = num_classes {
            init.num_classes = num_classes;
        }

        if let Some(image_size) = image_size {
            init.image_size = image_size;
        }

        if let Some(background_weighting) = background_weighting {
            init.background_weighting = background_weighting;
        }

        init
    }

    pub fn weight_schedule_init(&self) -> WeightScheduleInit {
        let Self {
            coord_weight,
            noobj_weight,
            epoch_threshold,
            ..
        } = *self;

        let mut init = WeightScheduleInit::default();
        let LossWeights { coord, noobj } = init.initial;

        init.initial = LossWeights {
            coord: coord_weight.map(|weight| weight.raw()).unwrap_or(coord),
            noobj: noobj_weight.map(|weight| weight.raw()).unwrap_or(noobj),
        };

        if let Some(epoch_threshold) = epoch_threshold {
            init.epoch_threshold = epoch_threshold;
        }

        init
    }
}
