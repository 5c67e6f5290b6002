//! Loss breakdown of saved prediction and ground truth tensors.

use crate::common::*;

/// The loss breakdown of one prediction and ground truth pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossReport {
    pub epoch: usize,
    pub weights: LossWeights,
    pub batch_size: usize,
    pub diagnostics: LossDiagnostics,
    /// The number of object cells where each box index is responsible.
    pub responsible_counts: Vec<usize>,
}

impl Display for LossReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "epoch: {}", self.epoch)?;
        writeln!(
            f,
            "weights: coord={} noobj={}",
            self.weights.coord, self.weights.noobj
        )?;
        writeln!(f, "batch size: {}", self.batch_size)?;
        writeln!(f, "objects: {}", self.diagnostics.num_objects)?;
        writeln!(
            f,
            "responsible boxes: {}",
            self.responsible_counts.iter().join(" ")
        )?;
        write!(f, "{}", self.diagnostics)
    }
}

/// Compute the loss with the weights scheduled for `epoch`.
pub fn loss_report(
    config: &LossConfig,
    prediction: &Tensor,
    target: &Tensor,
    epoch: usize,
) -> Result<LossReport> {
    let yolo_loss = config.yolo_v1_loss_init().build()?;
    let mut schedule = config.weight_schedule_init().build()?;
    schedule.set_epoch_weights(epoch);
    let weights = schedule.weights();

    let batch_size = yolo_loss.layout().check_pair(prediction, target)?;
    let (_, aux) = tch::no_grad(|| yolo_loss.forward(prediction, target, weights))?;

    let mut responsible_counts = vec![0; yolo_loss.layout().num_boxes()];
    aux.assignments
        .iter()
        .filter_map(|cell| cell.positive())
        .for_each(|(pred, _)| responsible_counts[pred.index] += 1);

    Ok(LossReport {
        epoch,
        weights,
        batch_size,
        diagnostics: aux.diagnostics,
        responsible_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tiny_config() -> LossConfig {
        LossConfig {
            grid_cells: Some(2),
            num_classes: Some(1),
            image_size: Some(4),
            ..Default::default()
        }
    }

    #[test]
    fn report_follows_the_schedule() -> Result<()> {
        let config = tiny_config();
        let target = Tensor::zeros(&[3, 2, 2, 11], (Kind::Float, Device::Cpu));
        let prediction = Tensor::ones(&[3, 2, 2, 11], (Kind::Float, Device::Cpu));

        // 12 background cells, each costs noobj * 1 + 1
        let early = loss_report(&config, &prediction, &target, 1)?;
        assert_eq!(early.batch_size, 3);
        assert_eq!(early.weights, LossWeights::default());
        assert_abs_diff_eq!(early.diagnostics.total_loss, 18.0, epsilon = 1e-5);
        assert_eq!(early.responsible_counts, vec![0, 0]);

        let late = loss_report(&config, &prediction, &target, 401)?;
        assert_abs_diff_eq!(late.diagnostics.total_loss, 24.0, epsilon = 1e-5);
        assert!(late.to_string().contains("iou=n/a"));
        Ok(())
    }

    #[test]
    fn report_counts_responsible_boxes() -> Result<()> {
        let config = tiny_config();
        let mut target = vec![0f32; 4 * 11];
        target[0..11].copy_from_slice(&[
            0.5, 0.5, 0.5, 0.5, 1.0, 0.0, 0.0, 2.0, 2.0, 4.0, 1.0,
        ]);
        let target = Tensor::of_slice(&target).view([1, 2, 2, 11]);
        let prediction = Tensor::zeros(&[1, 2, 2, 11], (Kind::Float, Device::Cpu));

        let report = loss_report(&config, &prediction, &target, 0)?;
        assert_eq!(report.diagnostics.num_objects, 1);
        assert_eq!(report.responsible_counts, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn reject_mismatched_tensors() {
        let config = tiny_config();
        let target = Tensor::zeros(&[1, 2, 2, 11], (Kind::Float, Device::Cpu));
        let prediction = Tensor::zeros(&[1, 7, 7, 30], (Kind::Float, Device::Cpu));
        assert!(loss_report(&config, &prediction, &target, 0).is_err());
    }
}
