//! Loss function building blocks.

mod assignment;
mod config;
mod output;
mod weights;
mod yolo_v1_loss;

pub use assignment::*;
pub use config::*;
pub use output::*;
pub use weights::*;
pub use yolo_v1_loss::*;
