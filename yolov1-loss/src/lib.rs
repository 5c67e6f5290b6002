//! The training loss of the YOLO v1 grid detector.

mod common;
pub mod layout;
pub mod loss;
pub mod profiling;
pub mod target;

pub use layout::*;
pub use loss::*;
pub use target::*;
