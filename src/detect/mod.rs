//! Detection backends for pretrained object-detection models.

pub mod backend;
pub mod backends;
pub mod model;
pub mod names;
pub mod registry;
pub mod result;

pub use backend::DetectorBackend;
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection};
