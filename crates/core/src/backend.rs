//! Execution backend selection and `ort` session construction.

use std::path::Path;

use ort::execution_providers::{
    CUDAExecutionProvider, DirectMLExecutionProvider, ExecutionProvider, ROCmExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, UpscaleError};

/// Hardware/runtime target the inference engine dispatches to.
///
/// Fixed once at engine construction; only the model may change per call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionBackend {
    Cuda,
    Rocm,
    DirectMl,
    #[default]
    Cpu,
}

impl ExecutionBackend {
    /// Parse from string (case-insensitive). Unknown values fall back to CPU.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "cuda" => Self::Cuda,
            "rocm" => Self::Rocm,
            "dml" | "directml" => Self::DirectMl,
            _ => Self::Cpu,
        }
    }
}

impl std::fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cuda => write!(f, "cuda"),
            Self::Rocm => write!(f, "rocm"),
            Self::DirectMl => write!(f, "directml"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// Build an `ort::Session` for `model_path` with the requested backend's
/// execution provider registered.
///
/// Graph optimization stays at the conservative basic level; these models
/// run once per image and session construction time dominates. If a GPU
/// provider is unavailable at runtime, ort falls back to CPU.
pub fn build_session(model_path: &Path, backend: ExecutionBackend) -> Result<Session> {
    debug!(model = %model_path.display(), backend = %backend, "building inference session");
    build_session_inner(model_path, backend).map_err(|source| UpscaleError::SessionInit {
        model: model_path.to_path_buf(),
        source,
    })
}

fn build_session_inner(
    model_path: &Path,
    backend: ExecutionBackend,
) -> ort::Result<Session> {
    let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level1)?;

    let builder = match backend {
        ExecutionBackend::Cuda => {
            let cuda = CUDAExecutionProvider::default();
            if !cuda.is_available().unwrap_or(false) {
                warn!("CUDA EP is not available — inference will fall back to CPU");
            }
            builder.with_execution_providers([cuda.build()])?
        }
        ExecutionBackend::Rocm => {
            let rocm = ROCmExecutionProvider::default();
            if !rocm.is_available().unwrap_or(false) {
                warn!("ROCm EP is not available — inference will fall back to CPU");
            }
            builder.with_execution_providers([rocm.build()])?
        }
        ExecutionBackend::DirectMl => {
            let dml = DirectMLExecutionProvider::default();
            if !dml.is_available().unwrap_or(false) {
                warn!("DirectML EP is not available — inference will fall back to CPU");
            }
            builder.with_execution_providers([dml.build()])?
        }
        ExecutionBackend::Cpu => builder,
    };

    builder.commit_from_file(model_path)
}
