//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use chrono::{DateTime, Local};
pub use itertools::Itertools;
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng, seq::SliceRandom};
pub use regex::Regex;
pub use serde::{Deserialize, Serialize};
pub use std::{
    fmt::{self, Display},
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};
pub use tch::{
    nn::{self, ModuleT, OptimizerConfig as _},
    Device, Kind, Tensor,
};
pub use tracing::{debug, info, info_span, warn};
pub use yolov1_loss::{
    LossConfig, LossDiagnostics, LossWeights, WeightSchedule, YoloV1Loss, YoloV1LossOutput,
};

pub type Fallible<T> = Result<T, Error>;
