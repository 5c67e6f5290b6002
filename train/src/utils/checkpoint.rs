use crate::{common::*, config::LoadCheckpoint};

pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

const CHECKPOINT_FILENAME_PATTERN: &str =
    r"^(\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}\.\d{3}[+-]\d{4})_\d{6}_\d+\.\d+\.ckpt$";

/// Save parameters to a checkpoint file and return its path.
pub fn save_checkpoint(
    vs: &nn::VarStore,
    checkpoint_dir: &Path,
    epoch: usize,
    loss: f64,
) -> Result<PathBuf> {
    let filename = format!(
        "{}_{:06}_{:08.5}.ckpt",
        Local::now().format(FILE_STRFTIME),
        epoch,
        loss
    );
    let path = checkpoint_dir.join(filename);
    vs.save(&path)
        .with_context(|| format!("failed to save checkpoint '{}'", path.display()))?;
    info!("saved checkpoint {}", path.display());
    Ok(path)
}

/// Load parameters from a directory with specified checkpoint loading method.
///
/// Returns the path of the loaded file.
pub fn try_load_checkpoint(
    vs: &mut nn::VarStore,
    logging_dir: &Path,
    load_checkpoint: &LoadCheckpoint,
) -> Result<Option<PathBuf>> {
    let path = match load_checkpoint {
        LoadCheckpoint::Disabled => {
            info!("checkpoint loading is disabled");
            None
        }
        LoadCheckpoint::FromRecent => {
            let checkpoint_file = find_recent_checkpoint(logging_dir)?;

            if checkpoint_file.is_none() {
                warn!("no checkpoint file found");
            }

            checkpoint_file
        }
        LoadCheckpoint::FromFile { file } => {
            if file.is_file() {
                Some(file.to_owned())
            } else {
                warn!("{} is not a file", file.display());
                None
            }
        }
    };

    if let Some(path) = &path {
        info!("load checkpoint file {}", path.display());
        vs.load_partial(path)
            .with_context(|| format!("failed to load checkpoint '{}'", path.display()))?;
    }

    Ok(path)
}

/// Find the checkpoint with the latest timestamp under `logging_dir/*/checkpoints`.
pub fn find_recent_checkpoint(logging_dir: &Path) -> Result<Option<PathBuf>> {
    let checkpoint_filename_regex = Regex::new(CHECKPOINT_FILENAME_PATTERN)?;
    let pattern = format!("{}/*/checkpoints/*.ckpt", logging_dir.display());

    let paths = glob::glob(&pattern)?.collect::<Result<Vec<_>, _>>()?;
    let checkpoint_file = paths
        .into_iter()
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?;
            let captures = checkpoint_filename_regex.captures(file_name)?;
            let datetime_str = captures.get(1)?.as_str();
            let datetime = DateTime::parse_from_str(datetime_str, FILE_STRFTIME).ok()?;
            Some((path, datetime))
        })
        .max_by_key(|(_path, datetime)| *datetime)
        .map(|(path, _datetime)| path);

    Ok(checkpoint_file)
}
