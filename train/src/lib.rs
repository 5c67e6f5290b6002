//! The training program of the YOLO v1 loss.

pub mod common;
pub mod config;
pub mod dataset;
pub mod report;
pub mod stats;
pub mod trainer;
pub mod utils;

use crate::{
    common::*,
    config::Config,
    dataset::TensorDataset,
    stats::EpochReport,
    trainer::TrainerInit,
};

/// The entry of training program.
pub fn start(config: &Config) -> Result<Vec<EpochReport>> {
    config.training.check()?;

    let start_time = Local::now();
    let logging_dir = config
        .logging
        .dir
        .join(format!("{}", start_time.format(utils::FILE_STRFTIME)));
    let checkpoint_dir = logging_dir.join("checkpoints");

    // create dirs and save config
    {
        fs::create_dir_all(&checkpoint_dir)?;
        let path = logging_dir.join("config.json5");
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&path, text)?;
    }

    // load dataset
    info!("loading dataset");
    let dataset = TensorDataset::open(&config.dataset.images_file, &config.dataset.targets_file)?;

    // init model
    info!("initializing model");
    let mut vs = nn::VarStore::new(config.training.device);
    let model_file = &config.model.torchscript_file;
    let model = tch::TrainableCModule::load(model_file, vs.root())
        .with_context(|| format!("failed to load model '{}'", model_file.display()))?;

    // load checkpoint
    utils::try_load_checkpoint(
        &mut vs,
        &config.logging.dir,
        &config.training.load_checkpoint,
    )?;

    let mut trainer = TrainerInit {
        vs,
        model,
        loss: config.loss.clone(),
        training: config.training.clone(),
        checkpoint_dir: Some(checkpoint_dir),
    }
    .build()?;
    let reports = trainer.fit(&dataset, config.training.epochs.get())?;

    // save statistics
    {
        let path = logging_dir.join("epochs.json");
        let text = serde_json::to_string_pretty(&reports)?;
        fs::write(&path, text)?;
    }

    Ok(reports)
}
