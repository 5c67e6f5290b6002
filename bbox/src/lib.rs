//! Safe bounding box types and the grid geometry of YOLO v1 detectors.

mod common;

pub use rect::*;
pub mod rect;

pub use tlbr::*;
pub mod tlbr;

pub use cycxhw::*;
pub mod cycxhw;

pub use grid::*;
pub mod grid;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
