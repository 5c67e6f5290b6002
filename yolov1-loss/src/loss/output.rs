use super::CellAssignment;
use crate::common::*;

/// The differentiable loss terms of a mini-batch.
#[derive(Debug, TensorLike)]
pub struct YoloV1LossOutput {
    pub total_loss: Tensor,
    pub coord_loss: Tensor,
    pub confidence_loss: Tensor,
    pub classification_loss: Tensor,
}

impl YoloV1LossOutput {
    /// Read the scalar values of the loss terms.
    pub fn diagnostics(&self, iou_sum: f64, num_objects: usize) -> LossDiagnostics {
        let scalar = |tensor: &Tensor| f64::from(&tensor.detach());

        LossDiagnostics {
            total_loss: scalar(&self.total_loss),
            coord_loss: scalar(&self.coord_loss),
            confidence_loss: scalar(&self.confidence_loss),
            classification_loss: scalar(&self.classification_loss),
            iou_sum,
            num_objects,
        }
    }
}

/// Plain scalar values reported alongside the loss.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LossDiagnostics {
    pub total_loss: f64,
    pub coord_loss: f64,
    pub confidence_loss: f64,
    pub classification_loss: f64,
    /// The sum of IoUs of responsible boxes.
    pub iou_sum: f64,
    /// The number of object cells.
    pub num_objects: usize,
}

impl LossDiagnostics {
    /// The average IoU of responsible boxes, or `None` without objects.
    pub fn mean_iou(&self) -> Option<f64> {
        (self.num_objects > 0).then(|| self.iou_sum / self.num_objects as f64)
    }

    pub fn is_finite(&self) -> bool {
        [
            self.total_loss,
            self.coord_loss,
            self.confidence_loss,
            self.classification_loss,
            self.iou_sum,
        ]
        .iter()
        .all(|value| value.is_finite())
    }
}

impl Add<LossDiagnostics> for LossDiagnostics {
    type Output = LossDiagnostics;

    fn add(mut self, rhs: LossDiagnostics) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<LossDiagnostics> for LossDiagnostics {
    fn add_assign(&mut self, rhs: LossDiagnostics) {
        self.total_loss += rhs.total_loss;
        self.coord_loss += rhs.coord_loss;
        self.confidence_loss += rhs.confidence_loss;
        self.classification_loss += rhs.classification_loss;
        self.iou_sum += rhs.iou_sum;
        self.num_objects += rhs.num_objects;
    }
}

impl Sum<LossDiagnostics> for LossDiagnostics {
    fn sum<I: Iterator<Item = LossDiagnostics>>(iter: I) -> Self {
        iter.fold(Self::default(), |lhs, rhs| lhs + rhs)
    }
}

impl Display for LossDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={:.6} coord={:.6} confidence={:.6} class={:.6}",
            self.total_loss, self.coord_loss, self.confidence_loss, self.classification_loss
        )?;
        match self.mean_iou() {
            Some(iou) => write!(f, " iou={:.6}", iou),
            None => write!(f, " iou=n/a"),
        }
    }
}

/// Values produced alongside the loss terms.
#[derive(Debug)]
pub struct YoloV1LossAuxiliary {
    pub diagnostics: LossDiagnostics,
    /// The box assignments of every cell, ordered by batch, row and column.
    pub assignments: Vec<CellAssignment>,
}
