//! Lifecycle of the single live inference session.
//!
//! One session exists at a time, valid only for the model path it was
//! built with. Rebuilds happen when a request names a different model;
//! the replacement is constructed fully before the old session is
//! dropped, so a failed rebuild keeps the last-known-good session.

use std::path::{Path, PathBuf};

use ndarray::Array4;
use ort::session::{RunOptions, Session};
use tracing::{debug, info};

use crate::backend::{self, ExecutionBackend};
use crate::error::{Result, UpscaleError};

/// Run-config entry asking the runtime to shrink its CPU memory arena
/// after each run, bounding peak memory across large images.
pub(crate) const ARENA_SHRINK_KEY: &str = "memory.enable_memory_arena_shrinkage";
pub(crate) const ARENA_SHRINK_VALUE: &str = "cpu:0";

/// A built session plus everything needed to run it.
pub struct SessionState {
    model_path: PathBuf,
    session: Session,
    run_options: RunOptions,
    input_name: String,
    output_name: String,
}

impl SessionState {
    fn build(model_path: &Path, backend: ExecutionBackend) -> Result<Self> {
        let session = backend::build_session(model_path, backend)?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| UpscaleError::Tensor {
                expected: "a model with one input tensor".to_string(),
                actual: "no inputs".to_string(),
            })?;
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| UpscaleError::Tensor {
                expected: "a model with one output tensor".to_string(),
                actual: "no outputs".to_string(),
            })?;

        let session_init = |source| UpscaleError::SessionInit {
            model: model_path.to_path_buf(),
            source,
        };
        let mut run_options = RunOptions::new().map_err(session_init)?;
        run_options
            .add_config_entry(ARENA_SHRINK_KEY, ARENA_SHRINK_VALUE)
            .map_err(session_init)?;

        debug!(
            model = %model_path.display(),
            input = %input_name,
            output = %output_name,
            "detected model IO"
        );

        Ok(Self {
            model_path: model_path.to_path_buf(),
            session,
            run_options,
            input_name,
            output_name,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Run the model on a `[1, 3, H, W]` input tensor.
    ///
    /// The output buffer is owned by the session and valid only until the
    /// next run, so the data is copied into an owned array before return.
    pub fn run(&mut self, input: Array4<f32>) -> Result<Array4<f32>> {
        let input_tensor = ort::value::Tensor::from_array(input)
            .map_err(|source| UpscaleError::Run { source })?;

        let outputs = self
            .session
            .run_with_options(
                ort::inputs![self.input_name.as_str() => &input_tensor],
                &self.run_options,
            )
            .map_err(|source| UpscaleError::Run { source })?;

        // Rejects sparse/opaque output values, the post-run IsTensor check.
        let view = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| UpscaleError::Tensor {
                expected: "an f32 tensor output".to_string(),
                actual: e.to_string(),
            })?;

        view.to_owned()
            .into_dimensionality::<ndarray::Ix4>()
            .map_err(|_| UpscaleError::Tensor {
                expected: "a rank-4 [1,3,H,W] output".to_string(),
                actual: format!("rank {}", view.ndim()),
            })
    }
}

/// Owns the single active session across repeated upscale calls.
pub struct SessionManager {
    backend: ExecutionBackend,
    state: Option<SessionState>,
}

impl SessionManager {
    pub fn new(backend: ExecutionBackend) -> Self {
        Self {
            backend,
            state: None,
        }
    }

    pub fn backend(&self) -> ExecutionBackend {
        self.backend
    }

    pub fn loaded_model(&self) -> Option<&Path> {
        self.state.as_ref().map(|s| s.model_path.as_path())
    }

    /// Make sure a session exists for `model_path`, rebuilding only when
    /// the path differs from the currently loaded one.
    pub fn ensure_session(&mut self, model_path: &Path) -> Result<&mut SessionState> {
        if needs_rebuild(self.loaded_model(), model_path) {
            let next = SessionState::build(model_path, self.backend)?;
            info!(
                model = %model_path.display(),
                backend = %self.backend,
                rebuilt = self.state.is_some(),
                "inference session ready"
            );
            self.state = Some(next);
        }
        Ok(self.state.as_mut().expect("session installed above"))
    }
}

/// A rebuild is needed unless the loaded model path matches exactly.
pub(crate) fn needs_rebuild(current: Option<&Path>, requested: &Path) -> bool {
    current != Some(requested)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_always_builds() {
        assert!(needs_rebuild(None, Path::new("models/up2x.onnx")));
    }

    #[test]
    fn same_model_path_is_a_fast_path() {
        let loaded = Path::new("models/up2x.onnx");
        assert!(!needs_rebuild(Some(loaded), Path::new("models/up2x.onnx")));
    }

    #[test]
    fn different_model_path_triggers_rebuild() {
        let loaded = Path::new("models/up2x.onnx");
        assert!(needs_rebuild(Some(loaded), Path::new("models/up4x.onnx")));
    }

    #[test]
    fn path_comparison_is_exact() {
        // No normalization: the reference compares the raw strings.
        let loaded = Path::new("models/up2x.onnx");
        assert!(needs_rebuild(Some(loaded), Path::new("./models/up2x.onnx")));
    }

    #[test]
    fn arena_shrinkage_entry_targets_the_cpu_allocator() {
        // The runtime silently ignores unknown run-config keys, so pin
        // the exact spelling it documents.
        assert_eq!(ARENA_SHRINK_KEY, "memory.enable_memory_arena_shrinkage");
        assert_eq!(ARENA_SHRINK_VALUE, "cpu:0");
    }

    #[test]
    fn manager_starts_with_no_session() {
        let manager = SessionManager::new(ExecutionBackend::Cpu);
        assert!(manager.loaded_model().is_none());
        assert_eq!(manager.backend(), ExecutionBackend::Cpu);
    }
}
