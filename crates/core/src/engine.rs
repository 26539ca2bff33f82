//! Top-level upscale orchestration: decode, route, infer, post-crop.

use std::path::Path;
use std::sync::Mutex;

use tracing::debug;

use crate::backend::ExecutionBackend;
use crate::cache::ResultCache;
use crate::error::Result;
use crate::raster::{self, RasterImage};
use crate::resize;
use crate::session::SessionManager;
use crate::tensor;

/// Fixed enlargement factor of the super-resolution models in scope,
/// dictated by the model architecture.
pub const MODEL_SCALE: u32 = 2;

/// The ML step of the pipeline: a normalized 3-channel sRGB image in, an
/// enlarged image out. Seam for substituting the inference runtime in
/// tests.
pub trait Upscaler: Send {
    /// Make the model at `model_path` ready to run. Called on every ML
    /// request, before any cached result is considered, so a stale
    /// session is replaced even when the request is served from cache.
    fn prepare(&mut self, model_path: &Path) -> Result<()>;

    fn upscale(&mut self, model_path: &Path, image: &RasterImage) -> Result<RasterImage>;
}

/// Production upscaler: runs the model through the managed `ort` session.
pub struct OrtUpscaler {
    sessions: SessionManager,
}

impl OrtUpscaler {
    pub fn new(backend: ExecutionBackend) -> Self {
        Self {
            sessions: SessionManager::new(backend),
        }
    }
}

impl Upscaler for OrtUpscaler {
    fn prepare(&mut self, model_path: &Path) -> Result<()> {
        self.sessions.ensure_session(model_path)?;
        Ok(())
    }

    fn upscale(&mut self, model_path: &Path, image: &RasterImage) -> Result<RasterImage> {
        let session = self.sessions.ensure_session(model_path)?;
        let input = tensor::encode(image)?;
        let output = session.run(input)?;
        // Shape validation happens here: anything other than an exact 2x
        // enlargement of the input is a tensor error.
        tensor::decode(
            &output,
            image.height() * MODEL_SCALE,
            image.width() * MODEL_SCALE,
        )
    }
}

struct MlState<U> {
    upscaler: U,
    cache: ResultCache,
}

/// Long-lived service value driving the whole decode/resize pipeline.
///
/// The inference session and result cache live behind one mutex; the
/// entire ML critical section (ensure-session, cache lookup, tensor
/// conversions, run, cache insert) holds it, so concurrent ML requests
/// serialize to one inference at a time. Identity and simple-resize
/// requests touch no shared state and run in parallel freely.
pub struct UpscaleEngine<U: Upscaler = OrtUpscaler> {
    ml: Mutex<MlState<U>>,
}

impl UpscaleEngine<OrtUpscaler> {
    pub fn new(backend: ExecutionBackend, cache_capacity: usize) -> Self {
        Self::with_upscaler(OrtUpscaler::new(backend), cache_capacity)
    }
}

impl<U: Upscaler> UpscaleEngine<U> {
    pub fn with_upscaler(upscaler: U, cache_capacity: usize) -> Self {
        Self {
            ml: Mutex::new(MlState {
                upscaler,
                cache: ResultCache::new(cache_capacity),
            }),
        }
    }

    /// Decode an encoded byte stream and resize it to exactly
    /// `(target_w, target_h)`.
    ///
    /// Enlargement goes through the super-resolution model named by
    /// `model_path`; shrinking uses plain thumbnailing, entropy-cropped
    /// when `crop` is set. `cache_key` identifies the
    /// (source, model, backend) combination for result caching; `None` or
    /// an empty key disables caching for this call.
    pub fn decode_and_resize(
        &self,
        encoded: &[u8],
        model_path: Option<&Path>,
        cache_key: Option<&str>,
        target_w: u32,
        target_h: u32,
        crop: bool,
    ) -> Result<RasterImage> {
        let source = raster::decode_bytes(encoded)?;
        self.resize_image(source, model_path, cache_key, target_w, target_h, crop)
    }

    /// Resize an already-decoded image to exactly `(target_w, target_h)`.
    pub fn resize_image(
        &self,
        source: RasterImage,
        model_path: Option<&Path>,
        cache_key: Option<&str>,
        target_w: u32,
        target_h: u32,
        crop: bool,
    ) -> Result<RasterImage> {
        let (src_w, src_h) = source.dimensions();

        if (src_w, src_h) == (target_w, target_h) {
            debug!(width = src_w, height = src_h, "source already at target size");
            return Ok(source);
        }

        let produced = if src_w >= target_w && src_h >= target_h {
            debug!(
                from = format!("{src_w}x{src_h}"),
                to = format!("{target_w}x{target_h}"),
                crop,
                "simple resize path"
            );
            resize::smart_resize(&source, target_w, target_h, crop)?
        } else {
            let model = match model_path.filter(|p| !p.as_os_str().is_empty()) {
                Some(model) => model,
                // Callers must not request enlargement without a model;
                // the source passes through unmodified.
                None => return Ok(source),
            };
            self.ml_upscale(source, model, cache_key)?
        };

        if produced.dimensions() != (target_w, target_h) {
            debug!(
                from = format!("{}x{}", produced.width(), produced.height()),
                to = format!("{target_w}x{target_h}"),
                "post pass to exact target"
            );
            resize::smart_resize(&produced, target_w, target_h, true)
        } else {
            Ok(produced)
        }
    }

    fn ml_upscale(
        &self,
        source: RasterImage,
        model: &Path,
        cache_key: Option<&str>,
    ) -> Result<RasterImage> {
        let key = cache_key.filter(|k| !k.is_empty());

        let mut ml = self.ml.lock().unwrap();
        let MlState { upscaler, cache } = &mut *ml;

        // Session first, cache second: a hit must not leave a session for
        // a different model installed.
        upscaler.prepare(model)?;

        if let Some(hit) = cache.lookup(key) {
            debug!(key = key.unwrap_or(""), "upscale cache hit");
            return Ok(hit.clone());
        }

        let normalized = raster::normalize_for_inference(source)?;
        let upscaled = upscaler.upscale(model, &normalized)?;

        if let Some(key) = key {
            cache.insert(key.to_string(), upscaled.clone());
        }
        Ok(upscaled)
    }
}
