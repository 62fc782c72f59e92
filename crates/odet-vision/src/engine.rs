//! Detection engine.
//!
//! Owns the loaded detector capability and its [`ModelInfo`], and exposes
//! two inference profiles:
//!
//! | Mode | Resize before inference | Default thresholds (conf / IoU) |
//! |------|-------------------------|---------------------------------|
//! | `detect` | none | 0.5 / 0.4 |
//! | `detect_fast` | width bounded to `max_stream_width` | 0.3 / 0.5 |
//!
//! Boxes are always reported in original-image pixels.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use odet_models::{BoundingBox, Detection, DetectionMode, ModelInfo, Thresholds};
use tracing::{debug, error, info, warn};

use crate::capability::{DetectorCapability, RawBox};
use crate::error::{VisionError, VisionResult};
use crate::metrics;
use crate::normalize::{bounded_downscale, normalize_channels};
use crate::raster::{Raster, ScaleContext};

/// Width bound applied by [`DetectionEngine::detect_fast`] unless configured.
pub const DEFAULT_MAX_STREAM_WIDTH: u32 = 640;

/// What to do when the capability fails during inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceFailurePolicy {
    /// Log the failure and answer with an empty detection list.
    #[default]
    Degrade,
    /// Return [`VisionError::Inference`] to the caller.
    Propagate,
}

impl InferenceFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceFailurePolicy::Degrade => "degrade",
            InferenceFailurePolicy::Propagate => "propagate",
        }
    }
}

impl FromStr for InferenceFailurePolicy {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(InferenceFailurePolicy::Degrade),
            "propagate" => Ok(InferenceFailurePolicy::Propagate),
            other => Err(VisionError::invalid_argument(format!(
                "unknown inference failure policy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for InferenceFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of the engine's model. Both states are terminal.
enum EngineState {
    Loaded(Arc<dyn DetectorCapability>),
    LoadFailed { reason: String },
}

/// Detection pipeline around one detector capability.
///
/// Immutable after construction; share it as `Arc<DetectionEngine>`.
pub struct DetectionEngine {
    state: EngineState,
    info: ModelInfo,
    policy: InferenceFailurePolicy,
    max_stream_width: u32,
}

impl DetectionEngine {
    /// Create a loaded engine around `capability`.
    pub fn new(capability: Arc<dyn DetectorCapability>, mut info: ModelInfo) -> Self {
        info.loaded = true;
        info!(
            capability = capability.name(),
            device = %info.device,
            num_classes = info.num_classes(),
            model_path = %info.model_path,
            "Detection engine ready"
        );

        Self {
            state: EngineState::Loaded(capability),
            info,
            policy: InferenceFailurePolicy::default(),
            max_stream_width: DEFAULT_MAX_STREAM_WIDTH,
        }
    }

    /// Create an engine whose model failed to load.
    ///
    /// Every detect call on it fails with [`VisionError::ModelNotLoaded`].
    pub fn load_failed(mut info: ModelInfo, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        info.loaded = false;
        warn!(model_path = %info.model_path, reason = %reason, "Detection engine has no model");

        Self {
            state: EngineState::LoadFailed { reason },
            info,
            policy: InferenceFailurePolicy::default(),
            max_stream_width: DEFAULT_MAX_STREAM_WIDTH,
        }
    }

    /// Load the YOLOv8 ONNX model described by `config`.
    ///
    /// A load error does not abort: the engine is returned in the
    /// load-failed state so the service can still report health.
    #[cfg(feature = "onnx")]
    pub fn from_onnx(config: crate::onnx::OnnxYoloConfig) -> Self {
        use crate::onnx::{preferred_device, OnnxYoloDetector};

        let model_path = config.model_path.clone();
        match OnnxYoloDetector::new(config) {
            Ok(detector) => {
                let info = ModelInfo {
                    loaded: true,
                    device: detector.device().to_string(),
                    class_names: detector.class_names().to_vec(),
                    model_path,
                };
                Self::new(Arc::new(detector), info)
            }
            Err(e) => {
                error!(model_path = %model_path, error = %e, "Failed to load model");
                let info = ModelInfo {
                    loaded: false,
                    device: preferred_device().to_string(),
                    class_names: Vec::new(),
                    model_path,
                };
                Self::load_failed(info, e.to_string())
            }
        }
    }

    pub fn with_failure_policy(mut self, policy: InferenceFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_stream_width(mut self, max_width: u32) -> Self {
        self.max_stream_width = max_width.max(1);
        self
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, EngineState::Loaded(_))
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    /// Why the model is unavailable, if it is.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            EngineState::Loaded(_) => None,
            EngineState::LoadFailed { reason } => Some(reason),
        }
    }

    pub fn failure_policy(&self) -> InferenceFailurePolicy {
        self.policy
    }

    pub fn max_stream_width(&self) -> u32 {
        self.max_stream_width
    }

    /// Full-fidelity detection on the raster as given.
    pub fn detect(
        &self,
        raster: &Raster,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> VisionResult<Vec<Detection>> {
        let capability = self.capability()?;
        check_thresholds(confidence_threshold, iou_threshold)?;

        let raster = canonical(raster)?;
        let scale = ScaleContext::identity(raster.width(), raster.height());
        self.run(
            capability.as_ref(),
            &raster,
            Thresholds::new(confidence_threshold, iou_threshold),
            scale,
            DetectionMode::Full,
        )
    }

    /// Latency-optimized detection bounded by the engine's stream width.
    pub fn detect_fast(
        &self,
        raster: &Raster,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> VisionResult<Vec<Detection>> {
        self.detect_fast_with_width(
            raster,
            confidence_threshold,
            iou_threshold,
            self.max_stream_width,
        )
    }

    /// Latency-optimized detection on a copy of the raster at most
    /// `max_width` pixels wide.
    ///
    /// Boxes are scaled back, so callers never see the reduced coordinate space.
    pub fn detect_fast_with_width(
        &self,
        raster: &Raster,
        confidence_threshold: f32,
        iou_threshold: f32,
        max_width: u32,
    ) -> VisionResult<Vec<Detection>> {
        let capability = self.capability()?;
        check_thresholds(confidence_threshold, iou_threshold)?;

        let (scaled, scale) = bounded_downscale(raster, max_width)?;
        let scaled = canonical(&scaled)?;
        self.run(
            capability.as_ref(),
            &scaled,
            Thresholds::new(confidence_threshold, iou_threshold),
            scale,
            DetectionMode::Stream,
        )
    }

    /// Turn raw capability boxes into detections in original-image pixels.
    ///
    /// Corners are multiplied by the scale factor and clamped to the
    /// original raster before width and height are derived. Capability
    /// order is preserved.
    pub fn normalize(&self, raw: Vec<RawBox>, scale: ScaleContext) -> Vec<Detection> {
        raw.into_iter()
            .map(|b| {
                let (x1, y1) = scale.to_original(b.x1, b.y1);
                let (x2, y2) = scale.to_original(b.x2, b.y2);
                Detection {
                    label: self.info.label_for(b.class_id),
                    confidence: b.confidence.clamp(0.0, 1.0),
                    bbox: BoundingBox::from_corners(x1, y1, x2, y2),
                    class_id: b.class_id,
                }
            })
            .collect()
    }

    fn capability(&self) -> VisionResult<&Arc<dyn DetectorCapability>> {
        match &self.state {
            EngineState::Loaded(capability) => Ok(capability),
            EngineState::LoadFailed { .. } => Err(VisionError::ModelNotLoaded),
        }
    }

    fn run(
        &self,
        capability: &dyn DetectorCapability,
        raster: &Raster,
        thresholds: Thresholds,
        scale: ScaleContext,
        mode: DetectionMode,
    ) -> VisionResult<Vec<Detection>> {
        let start = Instant::now();

        match capability.infer(raster, thresholds.confidence, thresholds.iou) {
            Ok(raw) => {
                let detections = self.normalize(raw, scale);
                let elapsed = start.elapsed().as_secs_f64();
                metrics::record_inference(mode, elapsed, detections.len());
                debug!(
                    mode = %mode,
                    width = raster.width(),
                    height = raster.height(),
                    scale_factor = scale.scale_factor(),
                    count = detections.len(),
                    duration_ms = elapsed * 1000.0,
                    "Detection completed"
                );
                Ok(detections)
            }
            Err(e) => {
                metrics::record_inference_failure(mode);
                match self.policy {
                    InferenceFailurePolicy::Degrade => {
                        error!(
                            mode = %mode,
                            capability = capability.name(),
                            error = %e,
                            "Inference failed, returning no detections"
                        );
                        Ok(Vec::new())
                    }
                    InferenceFailurePolicy::Propagate => Err(VisionError::inference(e.to_string())),
                }
            }
        }
    }
}

fn check_thresholds(confidence_threshold: f32, iou_threshold: f32) -> VisionResult<()> {
    if !Thresholds::new(confidence_threshold, iou_threshold).is_valid() {
        return Err(VisionError::invalid_argument(format!(
            "thresholds must be in [0, 1], got confidence={} iou={}",
            confidence_threshold, iou_threshold
        )));
    }
    Ok(())
}

fn canonical(raster: &Raster) -> VisionResult<Cow<'_, Raster>> {
    if raster.is_canonical() {
        Ok(Cow::Borrowed(raster))
    } else {
        normalize_channels(raster.clone()).map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MockDetectorCapability;

    fn coco_like_info() -> ModelInfo {
        ModelInfo {
            loaded: false,
            device: "cpu".to_string(),
            class_names: (0..80).map(|i| format!("label_{}", i)).collect(),
            model_path: "models/test.onnx".to_string(),
        }
    }

    fn mock() -> MockDetectorCapability {
        let mut mock = MockDetectorCapability::new();
        mock.expect_name().return_const("mock");
        mock
    }

    fn engine(mock: MockDetectorCapability) -> DetectionEngine {
        DetectionEngine::new(Arc::new(mock), coco_like_info())
    }

    #[test]
    fn test_new_marks_loaded() {
        let engine = engine(mock());
        assert!(engine.is_loaded());
        assert!(engine.model_info().loaded);
        assert!(engine.failure_reason().is_none());
        assert_eq!(engine.max_stream_width(), DEFAULT_MAX_STREAM_WIDTH);
        assert_eq!(engine.failure_policy(), InferenceFailurePolicy::Degrade);
    }

    #[test]
    fn test_zero_boxes_yield_empty() {
        let mut mock = mock();
        mock.expect_infer().times(1).returning(|_, _, _| Ok(Vec::new()));

        let raster = Raster::solid(32, 32, [0, 0, 0]).unwrap();
        let detections = engine(mock).detect(&raster, 0.5, 0.4).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_detect_passes_raster_and_thresholds_unchanged() {
        let mut mock = mock();
        mock.expect_infer()
            .withf(|raster: &Raster, conf: &f32, iou: &f32| {
                raster.width() == 1280 && raster.height() == 720 && *conf == 0.5 && *iou == 0.4
            })
            .times(1)
            .returning(|_, _, _| Ok(vec![RawBox::new(100.0, 50.0, 300.0, 250.0, 0.9, 2)]));

        let raster = Raster::solid(1280, 720, [1, 2, 3]).unwrap();
        let detections = engine(mock).detect(&raster, 0.5, 0.4).unwrap();

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.label, "label_2");
        assert_eq!(det.class_id, 2);
        assert_eq!(det.bbox, BoundingBox { x: 100.0, y: 50.0, width: 200.0, height: 200.0 });
    }

    #[test]
    fn test_detect_fast_rescales_to_original() {
        let mut mock = mock();
        mock.expect_infer()
            .withf(|raster: &Raster, _: &f32, _: &f32| raster.width() == 640 && raster.height() == 360)
            .times(1)
            .returning(|_, _, _| Ok(vec![RawBox::new(100.0, 100.0, 200.0, 200.0, 0.75, 0)]));

        let raster = Raster::solid(1280, 720, [0, 0, 0]).unwrap();
        let detections = engine(mock).detect_fast(&raster, 0.3, 0.5).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(
            detections[0].bbox,
            BoundingBox { x: 200.0, y: 200.0, width: 200.0, height: 200.0 }
        );
        assert_eq!(detections[0].confidence, 0.75);
    }

    #[test]
    fn test_detect_fast_small_raster_not_resized() {
        let mut mock = mock();
        mock.expect_infer()
            .withf(|raster: &Raster, _: &f32, _: &f32| raster.width() == 320 && raster.height() == 240)
            .times(1)
            .returning(|_, _, _| Ok(vec![RawBox::new(10.0, 20.0, 30.0, 60.0, 0.5, 1)]));

        let raster = Raster::solid(320, 240, [0, 0, 0]).unwrap();
        let detections = engine(mock).detect_fast(&raster, 0.3, 0.5).unwrap();
        assert_eq!(
            detections[0].bbox,
            BoundingBox { x: 10.0, y: 20.0, width: 20.0, height: 40.0 }
        );
    }

    #[test]
    fn test_custom_stream_width() {
        let mut mock = mock();
        mock.expect_infer()
            .withf(|raster: &Raster, _: &f32, _: &f32| raster.width() == 320 && raster.height() == 180)
            .times(1)
            .returning(|_, _, _| Ok(vec![RawBox::new(1.0, 1.0, 2.0, 2.0, 0.5, 0)]));

        let engine = engine(mock).with_max_stream_width(320);
        let raster = Raster::solid(1280, 720, [0, 0, 0]).unwrap();
        let detections = engine.detect_fast(&raster, 0.3, 0.5).unwrap();
        assert_eq!(
            detections[0].bbox,
            BoundingBox { x: 4.0, y: 4.0, width: 4.0, height: 4.0 }
        );
    }

    #[test]
    fn test_detect_fast_with_explicit_width() {
        let mut mock = mock();
        mock.expect_infer()
            .withf(|raster: &Raster, _: &f32, _: &f32| raster.width() == 160 && raster.height() == 90)
            .times(1)
            .returning(|_, _, _| Ok(vec![RawBox::new(10.0, 10.0, 20.0, 20.0, 0.5, 0)]));

        let raster = Raster::solid(1280, 720, [0, 0, 0]).unwrap();
        let detections = engine(mock).detect_fast_with_width(&raster, 0.3, 0.5, 160).unwrap();
        assert_eq!(
            detections[0].bbox,
            BoundingBox { x: 80.0, y: 80.0, width: 80.0, height: 80.0 }
        );
    }

    #[test]
    fn test_extreme_aspect_ratio_stays_inside_original() {
        let mut mock = mock();
        mock.expect_infer()
            .withf(|raster: &Raster, _: &f32, _: &f32| raster.width() == 640 && raster.height() == 1)
            .times(1)
            .returning(|_, _, _| Ok(vec![RawBox::new(0.0, 0.0, 640.0, 1.0, 0.5, 0)]));

        let raster = Raster::solid(4000, 3, [0, 0, 0]).unwrap();
        let detections = engine(mock).detect_fast(&raster, 0.3, 0.5).unwrap();
        assert_eq!(
            detections[0].bbox,
            BoundingBox { x: 0.0, y: 0.0, width: 4000.0, height: 3.0 }
        );
    }

    #[test]
    fn test_load_failed_rejects_detection() {
        let engine = DetectionEngine::load_failed(coco_like_info(), "missing file");
        let raster = Raster::solid(8, 8, [0, 0, 0]).unwrap();

        assert!(!engine.is_loaded());
        assert!(!engine.model_info().loaded);
        assert_eq!(engine.failure_reason(), Some("missing file"));
        assert!(matches!(
            engine.detect(&raster, 0.5, 0.4),
            Err(VisionError::ModelNotLoaded)
        ));
        assert!(matches!(
            engine.detect_fast(&raster, 0.3, 0.5),
            Err(VisionError::ModelNotLoaded)
        ));
    }

    #[test]
    fn test_out_of_range_class_gets_fallback_label() {
        let mut mock = mock();
        mock.expect_infer()
            .returning(|_, _, _| Ok(vec![RawBox::new(0.0, 0.0, 1.0, 1.0, 0.6, 999)]));

        let raster = Raster::solid(8, 8, [0, 0, 0]).unwrap();
        let detections = engine(mock).detect(&raster, 0.5, 0.4).unwrap();
        assert_eq!(detections[0].label, "class_999");
        assert_eq!(detections[0].class_id, 999);
    }

    #[test]
    fn test_capability_order_preserved() {
        let mut mock = mock();
        mock.expect_infer().returning(|_, _, _| {
            Ok(vec![
                RawBox::new(0.0, 0.0, 1.0, 1.0, 0.2, 5),
                RawBox::new(0.0, 0.0, 1.0, 1.0, 0.9, 1),
                RawBox::new(0.0, 0.0, 1.0, 1.0, 0.5, 3),
            ])
        });

        let raster = Raster::solid(8, 8, [0, 0, 0]).unwrap();
        let ids: Vec<usize> = engine(mock)
            .detect(&raster, 0.1, 0.4)
            .unwrap()
            .iter()
            .map(|d| d.class_id)
            .collect();
        assert_eq!(ids, vec![5, 1, 3]);
    }

    #[test]
    fn test_degrade_policy_swallows_failure() {
        let mut mock = mock();
        mock.expect_infer()
            .returning(|_, _, _| Err(VisionError::inference("runtime exploded")));

        let raster = Raster::solid(8, 8, [0, 0, 0]).unwrap();
        let engine = engine(mock);
        assert!(engine.detect(&raster, 0.5, 0.4).unwrap().is_empty());
        assert!(engine.detect_fast(&raster, 0.3, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_propagate_policy_returns_error() {
        let mut mock = mock();
        mock.expect_infer()
            .returning(|_, _, _| Err(VisionError::internal("runtime exploded")));

        let raster = Raster::solid(8, 8, [0, 0, 0]).unwrap();
        let engine = engine(mock).with_failure_policy(InferenceFailurePolicy::Propagate);
        assert!(matches!(
            engine.detect(&raster, 0.5, 0.4),
            Err(VisionError::Inference(_))
        ));
    }

    #[test]
    fn test_invalid_thresholds_skip_inference() {
        let mut mock = mock();
        mock.expect_infer().never();

        let raster = Raster::solid(8, 8, [0, 0, 0]).unwrap();
        let engine = engine(mock);
        assert!(matches!(
            engine.detect(&raster, 1.2, 0.4),
            Err(VisionError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.detect_fast(&raster, 0.3, -0.5),
            Err(VisionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_non_canonical_raster_is_normalized() {
        let mut mock = mock();
        mock.expect_infer()
            .withf(|raster: &Raster, _: &f32, _: &f32| raster.channels() == 3)
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let raster = Raster::new(4, 4, 4, vec![7; 64]).unwrap();
        assert!(engine(mock).detect(&raster, 0.5, 0.4).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_scaling_property() {
        let engine = DetectionEngine::load_failed(coco_like_info(), "unused");
        let raws = [
            RawBox::new(0.0, 0.0, 0.0, 0.0, 0.1, 0),
            RawBox::new(12.5, 7.25, 80.0, 33.0, 0.4, 1),
            RawBox::new(300.0, 200.0, 100.0, 50.0, 1.3, 2),
        ];

        for factor in [1.0f32, 1.5, 2.0, 3.75] {
            let scale = ScaleContext::new(factor, 2000, 2000);
            let detections = engine.normalize(raws.to_vec(), scale);

            for (raw, det) in raws.iter().zip(&detections) {
                assert!(det.bbox.width >= 0.0);
                assert!(det.bbox.height >= 0.0);
                assert!((0.0..=1.0).contains(&det.confidence));

                let left = raw.x1.min(raw.x2) * factor;
                let top = raw.y1.min(raw.y2) * factor;
                assert!((det.bbox.x - left).abs() < 1e-3);
                assert!((det.bbox.y - top).abs() < 1e-3);
                assert!((det.bbox.width - (raw.x2 - raw.x1).abs() * factor).abs() < 1e-3);
                assert!((det.bbox.height - (raw.y2 - raw.y1).abs() * factor).abs() < 1e-3);
            }
        }
    }

    /// Capability whose single box encodes the input raster's width.
    struct WidthEcho;

    impl DetectorCapability for WidthEcho {
        fn infer(&self, raster: &Raster, _: f32, _: f32) -> VisionResult<Vec<RawBox>> {
            let w = raster.width() as f32;
            Ok(vec![RawBox::new(0.0, 0.0, w, 1.0, 0.5, 0)])
        }

        fn name(&self) -> &'static str {
            "width_echo"
        }
    }

    #[test]
    fn test_concurrent_calls_do_not_cross() {
        let engine = DetectionEngine::new(Arc::new(WidthEcho), coco_like_info());

        std::thread::scope(|s| {
            let handles: Vec<_> = (1..=16u32)
                .map(|i| {
                    let engine = &engine;
                    s.spawn(move || {
                        let raster = Raster::solid(i * 10, 4, [0, 0, 0]).unwrap();
                        (i, engine.detect(&raster, 0.5, 0.4).unwrap())
                    })
                })
                .collect();

            for handle in handles {
                let (i, detections) = handle.join().unwrap();
                assert_eq!(detections.len(), 1);
                assert_eq!(detections[0].bbox.width, (i * 10) as f32);
            }
        });
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("degrade".parse::<InferenceFailurePolicy>().unwrap(), InferenceFailurePolicy::Degrade);
        assert_eq!(" Propagate ".parse::<InferenceFailurePolicy>().unwrap(), InferenceFailurePolicy::Propagate);
        assert!("retry".parse::<InferenceFailurePolicy>().is_err());
        assert_eq!(InferenceFailurePolicy::Propagate.to_string(), "propagate");
    }
}
