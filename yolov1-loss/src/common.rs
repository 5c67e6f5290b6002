pub use anyhow::{bail, ensure, Context as _, Result};
pub use approx::assert_abs_diff_eq;
pub use getset::CopyGetters;
pub use log::{debug, info, warn};
pub use ndarray::ArrayView4;
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    collections::HashSet,
    fmt::{self, Display},
    iter::Sum,
    ops::{Add, AddAssign},
    time::{Duration, Instant},
};
pub use tch::{Device, IndexOp, Kind, Tensor};
pub use tch_tensor_like::TensorLike;
