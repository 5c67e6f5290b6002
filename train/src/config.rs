//! Training program configuration format.

use crate::common::*;

pub use training::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub loss: LossConfig,
    pub training: TrainingConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }
}

/// The model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The TorchScript module producing `[batch, S, S, B * 5 + C]` outputs.
    pub torchscript_file: PathBuf,
}

/// Dataset options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// The tensor file of stacked input images.
    pub images_file: PathBuf,
    /// The tensor file of stacked ground truth tensors.
    pub targets_file: PathBuf,
}

/// Data logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

mod training {
    use super::*;

    /// The training options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TrainingConfig {
        /// The number of epochs to train.
        pub epochs: NonZeroUsize,
        /// The batch size.
        pub batch_size: Option<NonZeroUsize>,
        /// The constant learning rate.
        pub lr: Option<R64>,
        /// The weight decay parameter for optimizer.
        pub weight_decay: Option<R64>,
        /// The ratio of records held out for validation in each epoch.
        pub validation_ratio: Option<R64>,
        /// If set, it saves a checkpoint file per this epochs.
        pub save_checkpoint_epochs: Option<NonZeroUsize>,
        /// Checkpoint file loading method.
        #[serde(default = "default_load_checkpoint")]
        pub load_checkpoint: LoadCheckpoint,
        /// The seed of data splitting and shuffling.
        pub seed: Option<u64>,
        /// The training device.
        #[serde(with = "tch_serde::serde_device")]
        pub device: Device,
    }

    impl TrainingConfig {
        pub fn batch_size(&self) -> usize {
            self.batch_size.map(|size| size.get()).unwrap_or(64)
        }

        pub fn lr(&self) -> f64 {
            self.lr.map(|lr| lr.raw()).unwrap_or(1e-4)
        }

        pub fn weight_decay(&self) -> f64 {
            self.weight_decay.map(|wd| wd.raw()).unwrap_or(5e-4)
        }

        pub fn validation_ratio(&self) -> f64 {
            self.validation_ratio
                .map(|ratio| ratio.raw())
                .unwrap_or(0.1)
        }

        pub fn save_checkpoint_epochs(&self) -> usize {
            self.save_checkpoint_epochs
                .map(|epochs| epochs.get())
                .unwrap_or(100)
        }

        pub fn check(&self) -> Result<()> {
            let ratio = self.validation_ratio();
            ensure!(
                (0.0..1.0).contains(&ratio),
                "validation_ratio must be in range [0, 1), but get {}",
                ratio
            );
            ensure!(self.lr() > 0.0, "lr must be positive");
            ensure!(
                self.weight_decay() >= 0.0,
                "weight_decay must be non-negative"
            );
            Ok(())
        }
    }

    /// Checkpoint file loading method.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LoadCheckpoint {
        /// Disable checkpoint file loading.
        Disabled,
        /// Load the most recent checkpoint file.
        FromRecent,
        /// Load the checkpoint file at specified path.
        FromFile { file: PathBuf },
    }

    fn default_load_checkpoint() -> LoadCheckpoint {
        LoadCheckpoint::Disabled
    }
}
