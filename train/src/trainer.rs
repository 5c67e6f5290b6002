//! The epoch loop.

use crate::{
    common::*,
    config::TrainingConfig,
    dataset::{batches, random_split, Batch, RandomAccessDataset},
    stats::{EpochReport, EpochStats},
    utils::{self, RateCounter},
};

/// The initializer of [Trainer].
pub struct TrainerInit<M> {
    pub vs: nn::VarStore,
    pub model: M,
    pub loss: LossConfig,
    pub training: TrainingConfig,
    /// If set, checkpoints are saved into this directory.
    pub checkpoint_dir: Option<PathBuf>,
}

impl<M> TrainerInit<M>
where
    M: ModuleT,
{
    pub fn build(self) -> Result<Trainer<M>> {
        let Self {
            vs,
            model,
            loss,
            training,
            checkpoint_dir,
        } = self;

        training.check()?;

        let yolo_loss = loss.yolo_v1_loss_init().build()?;
        let schedule = loss.weight_schedule_init().build()?;
        let optimizer = nn::Adam {
            wd: training.weight_decay(),
            ..Default::default()
        }
        .build(&vs, training.lr())?;
        let rng = match training.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Trainer {
            vs,
            model,
            yolo_loss,
            schedule,
            optimizer,
            training,
            checkpoint_dir,
            rng,
            epoch: 0,
        })
    }
}

/// Trains a model against the YOLO v1 loss.
pub struct Trainer<M> {
    vs: nn::VarStore,
    model: M,
    yolo_loss: YoloV1Loss,
    schedule: WeightSchedule,
    optimizer: nn::Optimizer,
    training: TrainingConfig,
    checkpoint_dir: Option<PathBuf>,
    rng: StdRng,
    epoch: usize,
}

impl<M> Trainer<M>
where
    M: ModuleT,
{
    /// The number of completed epochs.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// The loss weights for the next epoch.
    pub fn weights(&self) -> LossWeights {
        self.schedule.weights()
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Train until `epochs` epochs are completed.
    pub fn fit<D>(&mut self, dataset: &D, epochs: usize) -> Result<Vec<EpochReport>>
    where
        D: RandomAccessDataset + ?Sized,
    {
        info!("start training");
        (self.epoch..epochs)
            .map(|_| self.train_epoch(dataset))
            .collect()
    }

    /// Run one epoch of training followed by validation.
    pub fn train_epoch<D>(&mut self, dataset: &D) -> Result<EpochReport>
    where
        D: RandomAccessDataset + ?Sized,
    {
        let epoch = self.epoch + 1;
        let _span = info_span!("epoch", epoch).entered();

        let weights = self.schedule.weights();
        let batch_size = self.training.batch_size();
        let (mut train_indexes, mut validation_indexes) = random_split(
            dataset.num_records(),
            self.training.validation_ratio(),
            &mut self.rng,
        );
        train_indexes.shuffle(&mut self.rng);
        validation_indexes.shuffle(&mut self.rng);

        // training
        let train_stats = {
            let mut stats = EpochStats::default();
            let mut rate_counter = RateCounter::with_second_interval();

            for batch in batches(dataset, &train_indexes, batch_size) {
                let batch = batch?.to_device(self.training.device);
                let num_records = batch.images.size()[0];

                let output = self.model.forward_t(&batch.images, true);
                let (losses, aux) = self
                    .yolo_loss
                    .forward(&output, &batch.targets, weights)
                    .with_context(|| "the model output does not fit the loss")?;
                self.optimizer.backward_step(&losses.total_loss);
                stats.add(&aux.diagnostics);

                debug!("batch {}\t{}", stats.num_batches(), aux.diagnostics);
                rate_counter.add(num_records as f64);
                if let Some(rate) = rate_counter.rate() {
                    info!("{:.2} records/s", rate);
                }
            }

            stats
        };

        // validation
        let validation_stats = tch::no_grad(|| -> Result<_> {
            let mut stats = EpochStats::default();

            for batch in batches(dataset, &validation_indexes, batch_size) {
                let Batch { images, targets } = batch?.to_device(self.training.device);
                let output = self.model.forward_t(&images, false);
                let (_, aux) = self.yolo_loss.forward(&output, &targets, weights)?;
                stats.add(&aux.diagnostics);
            }

            Ok(stats)
        })?;

        let report = EpochReport {
            epoch,
            train: train_stats.summary(),
            validation: validation_stats.summary(),
            weights,
        };
        info!("train-{}", report.train);
        info!("val-{}", report.validation);

        self.schedule.set_epoch_weights(epoch);
        self.epoch = epoch;

        // save checkpoint
        if let Some(checkpoint_dir) = &self.checkpoint_dir {
            if epoch % self.training.save_checkpoint_epochs() == 0 {
                utils::save_checkpoint(&self.vs, checkpoint_dir, epoch, report.train.loss)?;
            }
        }

        Ok(report)
    }
}
