//! Per-epoch loss statistics.

use crate::common::*;

/// Accumulates loss diagnostics over the mini-batches of one epoch.
#[derive(Debug, Clone, Default)]
pub struct EpochStats {
    num_batches: usize,
    diagnostics: LossDiagnostics,
}

impl EpochStats {
    pub fn add(&mut self, diagnostics: &LossDiagnostics) {
        self.num_batches += 1;
        self.diagnostics += *diagnostics;
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// Average the loss terms over batches.
    pub fn summary(&self) -> EpochSummary {
        let LossDiagnostics {
            total_loss,
            coord_loss,
            confidence_loss,
            classification_loss,
            ..
        } = self.diagnostics;
        let mean = |value: f64| {
            if self.num_batches > 0 {
                value / self.num_batches as f64
            } else {
                0.0
            }
        };

        EpochSummary {
            num_batches: self.num_batches,
            loss: mean(total_loss),
            coord_loss: mean(coord_loss),
            confidence_loss: mean(confidence_loss),
            classification_loss: mean(classification_loss),
            mean_iou: self.diagnostics.mean_iou(),
        }
    }
}

/// The batch-mean losses and the mean IoU of an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub num_batches: usize,
    pub loss: f64,
    pub coord_loss: f64,
    pub confidence_loss: f64,
    pub classification_loss: f64,
    /// `None` if no object was seen in the epoch.
    pub mean_iou: Option<f64>,
}

impl Display for EpochSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch-mean loss:{:.4} coord_loss:{:.4} confidence_loss:{:.4} class_loss:{:.4}",
            self.loss, self.coord_loss, self.confidence_loss, self.classification_loss
        )?;
        match self.mean_iou {
            Some(iou) => write!(f, " iou:{:.4}", iou),
            None => write!(f, " iou:n/a"),
        }
    }
}

/// The statistics of one completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub train: EpochSummary,
    pub validation: EpochSummary,
    pub weights: LossWeights,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn batch_mean_and_iou() {
        let mut stats = EpochStats::default();
        stats.add(&LossDiagnostics {
            total_loss: 4.0,
            coord_loss: 2.0,
            confidence_loss: 1.0,
            classification_loss: 1.0,
            iou_sum: 1.5,
            num_objects: 2,
        });
        stats.add(&LossDiagnostics {
            total_loss: 2.0,
            coord_loss: 0.0,
            confidence_loss: 2.0,
            classification_loss: 0.0,
            iou_sum: 0.5,
            num_objects: 2,
        });

        let summary = stats.summary();
        assert_eq!(summary.num_batches, 2);
        assert_abs_diff_eq!(summary.loss, 3.0);
        assert_abs_diff_eq!(summary.coord_loss, 1.0);
        assert_abs_diff_eq!(summary.confidence_loss, 1.5);
        assert_abs_diff_eq!(summary.classification_loss, 0.5);
        assert_abs_diff_eq!(summary.mean_iou.unwrap(), 0.5);
    }

    #[test]
    fn empty_epoch_has_no_iou() {
        let mut stats = EpochStats::default();
        assert_eq!(stats.summary().loss, 0.0);

        stats.add(&LossDiagnostics {
            total_loss: 1.0,
            ..Default::default()
        });
        let summary = stats.summary();
        assert_eq!(summary.mean_iou, None);
        assert!(summary.to_string().ends_with("iou:n/a"));
    }
}
