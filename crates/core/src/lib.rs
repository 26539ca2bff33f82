//! Core crate for lumiscale upscale orchestration.

pub mod backend;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod raster;
pub mod resize;
pub mod session;
pub mod tensor;

pub use backend::ExecutionBackend;
pub use engine::{UpscaleEngine, Upscaler, MODEL_SCALE};
pub use error::{Result, UpscaleError};
pub use raster::RasterImage;
