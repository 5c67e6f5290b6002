use crate::common::*;

/// The weighting factors of the localization and negative confidence terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    /// The weight of the localization loss, known as `l_coord`.
    pub coord: f64,
    /// The weight of the negative confidence loss, known as `l_noobj`.
    pub noobj: f64,
}

impl LossWeights {
    pub fn new(coord: f64, noobj: f64) -> Result<Self> {
        let weights = Self { coord, noobj };
        weights.check()?;
        Ok(weights)
    }

    fn check(&self) -> Result<()> {
        ensure!(
            self.coord.is_finite() && self.coord >= 0.0,
            "coord weight must be finite and non-negative"
        );
        ensure!(
            self.noobj.is_finite() && self.noobj >= 0.0,
            "noobj weight must be finite and non-negative"
        );
        Ok(())
    }
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            coord: 5.0,
            noobj: 0.5,
        }
    }
}

/// How the confidences of a background cell are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackgroundWeighting {
    /// Only the first box is weighted by `l_noobj`. The remaining boxes count
    /// with weight 1.
    FirstBoxOnly,
    /// Every box is weighted by `l_noobj`.
    AllBoxes,
}

impl BackgroundWeighting {
    /// The weight of the box at `index` in a background cell.
    pub fn box_weight(&self, index: usize, weights: &LossWeights) -> f64 {
        match (self, index) {
            (Self::FirstBoxOnly, 0) => weights.noobj,
            (Self::FirstBoxOnly, _) => 1.0,
            (Self::AllBoxes, _) => weights.noobj,
        }
    }
}

impl Default for BackgroundWeighting {
    fn default() -> Self {
        Self::FirstBoxOnly
    }
}

/// The initializer of [WeightSchedule].
#[derive(Debug, Clone)]
pub struct WeightScheduleInit {
    /// The weights used until the threshold epoch.
    pub initial: LossWeights,
    /// The weights used after the threshold epoch.
    pub stabilized: LossWeights,
    /// The last epoch that uses the initial weights.
    pub epoch_threshold: usize,
}

impl WeightScheduleInit {
    pub fn build(self) -> Result<WeightSchedule> {
        let Self {
            initial,
            stabilized,
            epoch_threshold,
        } = self;

        initial.check()?;
        stabilized.check()?;

        Ok(WeightSchedule {
            stabilized,
            epoch_threshold,
            current: initial,
        })
    }
}

impl Default for WeightScheduleInit {
    fn default() -> Self {
        Self {
            initial: LossWeights::default(),
            stabilized: LossWeights {
                coord: 1.0,
                noobj: 1.0,
            },
            epoch_threshold: 400,
        }
    }
}

/// Epoch-driven loss weights.
///
/// The caller owns the schedule, advances it once per completed epoch, and
/// passes [weights](WeightSchedule::weights) into every loss computation.
#[derive(Debug, Clone)]
pub struct WeightSchedule {
    stabilized: LossWeights,
    epoch_threshold: usize,
    current: LossWeights,
}

impl WeightSchedule {
    /// Apply the schedule after `epoch`. The weights switch to the stabilized
    /// values once `epoch` is strictly greater than the threshold, and never
    /// switch back.
    pub fn set_epoch_weights(&mut self, epoch: usize) {
        if epoch > self.epoch_threshold && self.current != self.stabilized {
            info!(
                "epoch {} passed threshold {}, switch loss weights from {:?} to {:?}",
                epoch, self.epoch_threshold, self.current, self.stabilized
            );
            self.current = self.stabilized;
        }
    }

    /// The weights for the next loss computation.
    pub fn weights(&self) -> LossWeights {
        self.current
    }

    pub fn epoch_threshold(&self) -> usize {
        self.epoch_threshold
    }
}
