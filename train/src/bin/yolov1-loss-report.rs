use anyhow::{Context, Result};
use std::{env, path::PathBuf};
use structopt::StructOpt;
use tch::Tensor;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};
use yolov1_loss::LossConfig;

#[derive(Debug, Clone, StructOpt)]
/// Print the YOLO v1 loss breakdown of saved tensors
struct Args {
    #[structopt(long)]
    /// loss configuration file in JSON5, the defaults are used if not set
    pub config_file: Option<PathBuf>,
    #[structopt(long)]
    /// prediction tensor file of shape [batch, S, S, B * 5 + C]
    pub prediction_file: PathBuf,
    #[structopt(long)]
    /// ground truth tensor file of shape [batch, S, S, 10 + C]
    pub target_file: PathBuf,
    #[structopt(long, default_value = "0")]
    /// the number of completed epochs to apply the weight schedule
    pub epoch: usize,
    #[structopt(long)]
    /// print the report in JSON
    pub json: bool,
}

fn main() -> Result<()> {
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::WARN.into())
        } else {
            filter
        }
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    let Args {
        config_file,
        prediction_file,
        target_file,
        epoch,
        json,
    } = Args::from_args();

    let config: LossConfig = match &config_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            json5::from_str(&text)
                .with_context(|| format!("failed to parse '{}'", path.display()))?
        }
        None => LossConfig::default(),
    };
    let prediction = Tensor::load(&prediction_file)
        .with_context(|| format!("failed to load '{}'", prediction_file.display()))?;
    let target = Tensor::load(&target_file)
        .with_context(|| format!("failed to load '{}'", target_file.display()))?;

    let report = train::report::loss_report(&config, &prediction, &target, epoch)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    Ok(())
}
