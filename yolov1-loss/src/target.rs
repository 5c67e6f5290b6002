//! Ground truth records and their encoder.

use crate::{
    common::*,
    layout::{target_field, GridLayout},
};
use bbox::{prelude::*, GridBox, GridCell, GridGeometry, TLBR};
use ndarray::ArrayView1;

/// Check whether a record area denotes a background cell.
///
/// The area is rounded half to even, so areas up to 0.5 pixel² count as
/// background.
pub fn is_background_area(area: f64) -> bool {
    area.round_ties_even() == 0.0
}

/// The geometric part of a ground truth record of one grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellTarget {
    /// The box encoded relative to the cell.
    pub grid_box: GridBox,
    /// The object presence indicator.
    pub presence: f64,
    /// The box corners in pixels.
    pub tlbr: TLBR<f64>,
    /// The precomputed box area in pixels. Zero marks a background cell.
    pub area: f64,
}

impl CellTarget {
    /// Read the geometric fields of a ground truth record.
    pub fn from_record(record: ArrayView1<f64>) -> Self {
        let field = |index: usize| record[index];

        Self {
            grid_box: GridBox {
                cx: field(target_field::CX),
                cy: field(target_field::CY),
                w: field(target_field::W),
                h: field(target_field::H),
            },
            presence: field(target_field::PRESENCE),
            tlbr: TLBR::from_xyxy_unchecked([
                field(target_field::XMIN),
                field(target_field::YMIN),
                field(target_field::XMAX),
                field(target_field::YMAX),
            ]),
            area: field(target_field::AREA),
        }
    }

    pub fn is_background(&self) -> bool {
        is_background_area(self.area)
    }
}

/// A labeled bounding box in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledBox {
    pub tlbr: TLBR<f64>,
    pub class: usize,
}

/// Encodes labeled boxes into the ground truth tensor layout.
#[derive(Debug, Clone)]
pub struct TargetEncoder {
    layout: GridLayout,
    geometry: GridGeometry,
}

impl TargetEncoder {
    pub fn new(layout: GridLayout, geometry: GridGeometry) -> Result<Self> {
        ensure!(
            layout.grid_cells() == geometry.grid_cells(),
            "the layout has {} grid cells per side, but the geometry has {}",
            layout.grid_cells(),
            geometry.grid_cells()
        );
        Ok(Self { layout, geometry })
    }

    /// Encode the boxes of one image into a `[S, S, 10 + C]` tensor.
    ///
    /// Each cell holds at most one object. When several box centers fall
    /// into the same cell, the box with the largest area is kept.
    pub fn encode(&self, labels: &[LabeledBox]) -> Result<Tensor> {
        let s = self.layout.grid_cells();
        let entries = self.layout.target_entries();
        let num_classes = self.layout.num_classes();

        let mut records = vec![0f32; s * s * entries];
        let mut kept_areas = vec![None::<f64>; s * s];

        for label in labels {
            let LabeledBox { tlbr, class } = label;
            ensure!(
                *class < num_classes,
                "class index {} is out of range, expect less than {}",
                class,
                num_classes
            );

            let (GridCell { row, col }, grid_box) = match self.geometry.locate(tlbr) {
                Some(located) => located,
                None => {
                    warn!("ignore a box with center outside the image: {:?}", tlbr);
                    continue;
                }
            };

            let cell_index = row * s + col;
            let area = tlbr.area();
            match kept_areas[cell_index] {
                Some(kept) if kept >= area => {
                    debug!(
                        "cell ({}, {}) is occupied by a larger box, drop {:?}",
                        row, col, tlbr
                    );
                    continue;
                }
                _ => kept_areas[cell_index] = Some(area),
            }

            let [xmin, ymin, xmax, ymax] = tlbr.xyxy();
            let record = &mut records[cell_index * entries..(cell_index + 1) * entries];
            record.iter_mut().for_each(|value| *value = 0.0);
            record[target_field::CX] = grid_box.cx as f32;
            record[target_field::CY] = grid_box.cy as f32;
            record[target_field::W] = grid_box.w as f32;
            record[target_field::H] = grid_box.h as f32;
            record[target_field::PRESENCE] = 1.0;
            record[target_field::XMIN] = xmin as f32;
            record[target_field::YMIN] = ymin as f32;
            record[target_field::XMAX] = xmax as f32;
            record[target_field::YMAX] = ymax as f32;
            record[target_field::AREA] = area as f32;
            record[target_field::CLASSES + class] = 1.0;
        }

        Ok(Tensor::of_slice(&records).view([s as i64, s as i64, entries as i64]))
    }

    /// Encode a batch of images into a `[batch, S, S, 10 + C]` tensor.
    pub fn encode_batch<L>(&self, batch: impl IntoIterator<Item = L>) -> Result<Tensor>
    where
        L: Borrow<[LabeledBox]>,
    {
        let targets = batch
            .into_iter()
            .map(|labels| self.encode(labels.borrow()))
            .collect::<Result<Vec<_>>>()?;
        ensure!(!targets.is_empty(), "the batch must not be empty");
        Ok(Tensor::stack(&targets, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::iproduct;
    use ndarray::ArrayView4;

    fn encoder() -> TargetEncoder {
        TargetEncoder::new(GridLayout::default(), GridGeometry::default()).unwrap()
    }

    #[test]
    fn background_area_rounding() {
        assert!(is_background_area(0.0));
        assert!(is_background_area(0.4));
        assert!(is_background_area(0.5));
        assert!(is_background_area(-0.5));
        assert!(!is_background_area(0.6));
        assert!(!is_background_area(1.5));
        assert!(!is_background_area(4.0));
    }

    #[test]
    fn reject_mismatched_geometry() -> Result<()> {
        let geometry = GridGeometry::new(448, 14)?;
        assert!(TargetEncoder::new(GridLayout::default(), geometry).is_err());
        Ok(())
    }

    #[test]
    fn encode_single_box() -> Result<()> {
        let labels = vec![LabeledBox {
            tlbr: TLBR::from_xyxy_unchecked([100.0, 150.0, 200.0, 230.0]),
            class: 3,
        }];
        let target = encoder().encode(&labels)?;
        assert_eq!(target.size(), vec![7, 7, 30]);

        let values = Vec::<f64>::from(&target.view([-1]).to_kind(Kind::Double));
        let array = ArrayView4::from_shape((1, 7, 7, 30), &values)?;

        let record = array.slice(ndarray::s![0, 2, 2, ..]);
        let cell = CellTarget::from_record(record);
        assert!(!cell.is_background());
        assert_eq!(cell.presence, 1.0);
        assert_eq!(cell.area, 8000.0);
        assert_eq!(cell.tlbr.xyxy(), [100.0, 150.0, 200.0, 230.0]);
        assert_abs_diff_eq!(cell.grid_box.cx, 150.0 / 64.0 - 2.0, epsilon = 1e-6);
        assert_eq!(record[target_field::CLASSES + 3], 1.0);
        assert_abs_diff_eq!(
            record.slice(ndarray::s![target_field::CLASSES..]).sum(),
            1.0
        );

        let occupied = iproduct!(0..7, 0..7)
            .filter(|&(row, col)| {
                !CellTarget::from_record(array.slice(ndarray::s![0, row, col, ..])).is_background()
            })
            .count();
        assert_eq!(occupied, 1);
        Ok(())
    }

    #[test]
    fn larger_box_wins_the_cell() -> Result<()> {
        let small = LabeledBox {
            tlbr: TLBR::from_xyxy_unchecked([10.0, 10.0, 20.0, 20.0]),
            class: 0,
        };
        let large = LabeledBox {
            tlbr: TLBR::from_xyxy_unchecked([0.0, 0.0, 30.0, 30.0]),
            class: 1,
        };

        for labels in [vec![small.clone(), large.clone()], vec![large.clone(), small.clone()]] {
            let target = encoder().encode(&labels)?;
            let record = Vec::<f32>::from(&target.i((0, 0)));
            assert_eq!(record[target_field::AREA], 900.0);
            assert_eq!(record[target_field::CLASSES], 0.0);
            assert_eq!(record[target_field::CLASSES + 1], 1.0);
        }
        Ok(())
    }

    #[test]
    fn reject_out_of_range_class() {
        let labels = vec![LabeledBox {
            tlbr: TLBR::from_xyxy_unchecked([0.0, 0.0, 30.0, 30.0]),
            class: 20,
        }];
        assert!(encoder().encode(&labels).is_err());
    }

    #[test]
    fn encode_batch_stacks_images() -> Result<()> {
        let labels = vec![
            vec![],
            vec![LabeledBox {
                tlbr: TLBR::from_xyxy_unchecked([0.0, 0.0, 30.0, 30.0]),
                class: 1,
            }],
        ];
        let target = encoder().encode_batch(labels.iter().map(|labels| labels.as_slice()))?;
        assert_eq!(target.size(), vec![2, 7, 7, 30]);
        assert_eq!(f64::from(&target.get(0).sum(Kind::Float)), 0.0);
        Ok(())
    }
}
