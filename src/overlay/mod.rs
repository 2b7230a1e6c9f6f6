//! HTML labels anchored in the 3D scene.

pub mod fragment;
pub mod labels;
pub mod surface;

pub use labels::{create_anchor_labels, LabelKind};
pub use surface::{ElementId, OverlaySurface};
