//! YOLOv8 object detection through ONNX Runtime.
//!
//! Provides the production detector capability with GPU acceleration support:
//! - CUDA on Linux with NVIDIA GPU
//! - CoreML on macOS with Apple Silicon
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use super::labels::{coco_class_names, load_class_names};
use super::nms::non_maximum_suppression;
use crate::capability::{DetectorCapability, RawBox};
use crate::error::{VisionError, VisionResult};
use crate::raster::Raster;

/// Configuration for the ONNX detector.
#[derive(Debug, Clone)]
pub struct OnnxYoloConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Optional label file (one class per line); COCO when unset
    pub class_names_path: Option<String>,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for OnnxYoloConfig {
    fn default() -> Self {
        Self {
            model_path: "models/best.onnx".to_string(),
            class_names_path: None,
            input_size: 640,
        }
    }
}

/// Object detector using a YOLOv8 ONNX export.
///
/// The session is behind a mutex, so concurrent callers are serialized and
/// each call's output belongs to its own input.
pub struct OnnxYoloDetector {
    session: Mutex<Session>,
    config: OnnxYoloConfig,
    device: &'static str,
    class_names: Vec<String>,
}

impl OnnxYoloDetector {
    /// Create a new detector from config.
    ///
    /// Returns error if model file doesn't exist or cannot be loaded.
    pub fn new(config: OnnxYoloConfig) -> VisionResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }
        if config.input_size == 0 {
            return Err(VisionError::invalid_argument("input_size must be greater than zero"));
        }

        let class_names = match &config.class_names_path {
            Some(path) => load_class_names(path)?,
            None => coco_class_names(),
        };

        let (session, device) = create_session(model_path)?;
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            num_classes = class_names.len(),
            device,
            "Object detector initialized"
        );

        Ok(Self {
            session: Mutex::new(session),
            config,
            device,
            class_names,
        })
    }

    /// Execution device the session was committed on.
    pub fn device(&self) -> &'static str {
        self.device
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Preprocess a BGR raster for YOLOv8 inference.
    ///
    /// - BGR -> RGB
    /// - Resize to model input size (640x640)
    /// - Normalize pixel values to [0, 1]
    /// - Convert to NCHW format (batch, channels, height, width)
    fn preprocess(&self, raster: &Raster) -> VisionResult<Value> {
        let input_size = self.config.input_size;
        if !raster.is_canonical() {
            return Err(VisionError::invalid_argument(format!(
                "detector expects 3-channel rasters, got {}",
                raster.channels()
            )));
        }

        let rgb_data: Vec<u8> = raster
            .data()
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect();
        let rgb = RgbImage::from_raw(raster.width(), raster.height(), rgb_data)
            .ok_or_else(|| VisionError::internal("Failed to create image buffer"))?;

        let resized = DynamicImage::ImageRgb8(rgb)
            .resize_exact(input_size, input_size, FilterType::Triangle)
            .to_rgb8();
        let (w, h) = (input_size as usize, input_size as usize);

        // HWC -> CHW with normalization to [0, 1]
        let mut chw_data: Vec<f32> = vec![0.0; 3 * h * w];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                chw_data[c * h * w + i] = pixel[c] as f32 / 255.0;
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::internal(format!("Failed to create tensor: {}", e)))
    }

    /// Run ONNX inference, returning the output shape and flat data.
    fn run_inference(&self, input: Value) -> VisionResult<(Vec<usize>, Vec<f32>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::inference(format!("ONNX inference failed: {}", e)))?;

        // YOLOv8 output is [1, 4 + classes, candidates]
        let output = outputs
            .get("output0")
            .ok_or_else(|| VisionError::inference("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("Failed to extract tensor: {}", e)))?;

        let dims = tensor.0.iter().map(|&d| d.max(0) as usize).collect();
        Ok((dims, tensor.1.to_vec()))
    }
}

impl DetectorCapability for OnnxYoloDetector {
    fn infer(
        &self,
        raster: &Raster,
        confidence_threshold: f32,
        iou_threshold: f32,
    ) -> VisionResult<Vec<RawBox>> {
        let input = self.preprocess(raster)?;
        let (dims, data) = self.run_inference(input)?;

        let candidates = decode_output(
            &dims,
            data,
            confidence_threshold,
            self.config.input_size,
            raster.width(),
            raster.height(),
        )?;
        let kept = non_maximum_suppression(candidates, iou_threshold);

        debug!(count = kept.len(), "Object detection completed");
        Ok(kept)
    }

    fn name(&self) -> &'static str {
        "onnx_yolov8"
    }
}

/// Parse a YOLOv8 output tensor into boxes in the raster's pixel space.
///
/// Accepts `[1, F, N]` (standard export) or `[1, N, F]` (transposed export)
/// with `F = 4 + classes`; each candidate is `cx, cy, w, h` in model-input
/// pixels followed by per-class scores. Boxes scoring below
/// `confidence_threshold` are dropped, the rest are clamped to the raster.
pub fn decode_output(
    dims: &[usize],
    data: Vec<f32>,
    confidence_threshold: f32,
    input_size: u32,
    raster_width: u32,
    raster_height: u32,
) -> VisionResult<Vec<RawBox>> {
    let (a, b) = match dims {
        [1, a, b] | [a, b] => (*a, *b),
        _ => {
            return Err(VisionError::inference(format!(
                "Unexpected output shape: {:?}",
                dims
            )))
        }
    };

    // Candidates always outnumber features in YOLOv8 heads
    let transposed_export = a > b;
    let (num_features, num_boxes) = if transposed_export { (b, a) } else { (a, b) };

    if num_features <= 4 {
        return Err(VisionError::inference(format!(
            "Output has {} features, expected 4 box values plus class scores",
            num_features
        )));
    }
    if data.len() != num_features * num_boxes {
        return Err(VisionError::inference(format!(
            "Unexpected output size: expected {}, got {}",
            num_features * num_boxes,
            data.len()
        )));
    }

    let num_classes = num_features - 4;
    let array = if transposed_export {
        Array::from_shape_vec((num_boxes, num_features), data)
    } else {
        Array::from_shape_vec((num_features, num_boxes), data).map(|a| a.reversed_axes())
    }
    .map_err(|e| VisionError::inference(format!("Failed to reshape output: {}", e)))?;
    // array is [num_boxes, num_features]

    let input_size = input_size as f32;
    let (max_x, max_y) = (raster_width as f32, raster_height as f32);
    let scale_w = max_x / input_size;
    let scale_h = max_y / input_size;

    let mut candidates = Vec::new();
    for row in array.outer_iter() {
        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);

        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for c in 0..num_classes {
            let score = row[4 + c];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < confidence_threshold {
            continue;
        }

        // Center format -> corners, then model space -> raster space
        let x1 = ((cx - w / 2.0) * scale_w).clamp(0.0, max_x);
        let y1 = ((cy - h / 2.0) * scale_h).clamp(0.0, max_y);
        let x2 = ((cx + w / 2.0) * scale_w).clamp(0.0, max_x);
        let y2 = ((cy + h / 2.0) * scale_h).clamp(0.0, max_y);

        candidates.push(RawBox::new(x1, y1, x2, y2, best_score, best_class));
    }

    Ok(candidates)
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> VisionResult<(Session, &'static str)> {
    // Read model file
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| VisionError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::internal(format!("Failed to set optimization level: {}", e)))?;

    // Try CUDA on Linux with cuda feature
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for object detection");
                return Ok((session, "cuda"));
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    // Try CoreML on macOS
    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for object detection");
                return Ok((session, "coreml"));
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    // CPU fallback
    info!("Using CPU execution provider for object detection");
    let session = builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::internal(format!("Failed to load ONNX model: {}", e)))?;
    Ok((session, "cpu"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `[1, 4 + classes, N]` tensor from (cx, cy, w, h, scores).
    fn tensor(candidates: &[([f32; 4], Vec<f32>)]) -> (Vec<usize>, Vec<f32>) {
        let num_classes = candidates[0].1.len();
        let features = 4 + num_classes;
        let n = candidates.len();
        let mut data = vec![0.0; features * n];
        for (i, (bbox, scores)) in candidates.iter().enumerate() {
            for (f, v) in bbox.iter().chain(scores.iter()).enumerate() {
                data[f * n + i] = *v;
            }
        }
        (vec![1, features, n], data)
    }

    #[test]
    fn test_config_default() {
        let config = OnnxYoloConfig::default();
        assert_eq!(config.input_size, 640);
        assert_eq!(config.model_path, "models/best.onnx");
        assert!(config.class_names_path.is_none());
    }

    #[test]
    fn test_missing_model_file() {
        let config = OnnxYoloConfig {
            model_path: "/nonexistent/model.onnx".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            OnnxYoloDetector::new(config),
            Err(VisionError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_decode_output_maps_to_raster_space() {
        let (dims, data) = tensor(&[
            ([320.0, 320.0, 64.0, 128.0], vec![0.1, 0.8, 0.05]),
            ([100.0, 100.0, 10.0, 10.0], vec![0.2, 0.1, 0.1]),
        ]);

        let boxes = decode_output(&dims, data, 0.5, 640, 1280, 640).unwrap();
        assert_eq!(boxes.len(), 1);

        let b = boxes[0];
        assert_eq!(b.class_id, 1);
        assert!((b.confidence - 0.8).abs() < 1e-6);
        // x scaled by 2, y by 1
        assert!((b.x1 - 576.0).abs() < 1e-3);
        assert!((b.x2 - 704.0).abs() < 1e-3);
        assert!((b.y1 - 256.0).abs() < 1e-3);
        assert!((b.y2 - 384.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_output_clamps_to_raster() {
        let (dims, data) = tensor(&[([5.0, 635.0, 20.0, 20.0], vec![0.9])]);
        let boxes = decode_output(&dims, data, 0.5, 640, 640, 640).unwrap();
        assert_eq!(boxes[0].x1, 0.0);
        assert_eq!(boxes[0].y2, 640.0);
    }

    #[test]
    fn test_decode_output_transposed_export() {
        // [1, N, F] with N = 6 candidates, F = 5
        let mut data = Vec::new();
        for i in 0..6 {
            let score = if i == 3 { 0.95 } else { 0.0 };
            data.extend_from_slice(&[50.0, 50.0, 20.0, 20.0, score]);
        }

        let boxes = decode_output(&[1, 6, 5], data, 0.5, 100, 100, 100).unwrap();
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].x1 - 40.0).abs() < 1e-4);
        assert!((boxes[0].x2 - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_output_rejects_bad_shapes() {
        assert!(decode_output(&[1, 2, 3, 4], vec![0.0; 24], 0.5, 640, 640, 640).is_err());
        assert!(decode_output(&[1, 84, 10], vec![0.0; 5], 0.5, 640, 640, 640).is_err());
        assert!(decode_output(&[1, 4, 10], vec![0.0; 40], 0.5, 640, 640, 640).is_err());
    }
}
