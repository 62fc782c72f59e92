#![deny(unreachable_patterns)]
//! Image ingestion and object detection.
//!
//! This crate provides:
//! - Base64 / data-URI image decoding into canonical BGR rasters
//! - Channel normalization and width-bounded downscaling
//! - The `DetectorCapability` seam and the `DetectionEngine` built on it
//! - A YOLOv8 ONNX Runtime capability (feature `onnx`, on by default)

pub mod capability;
pub mod codec;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod normalize;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod raster;

pub use capability::{DetectorCapability, RawBox};
pub use codec::{decode, decode_bytes, encode, TransportFormat};
pub use engine::{DetectionEngine, InferenceFailurePolicy, DEFAULT_MAX_STREAM_WIDTH};
pub use error::{VisionError, VisionResult};
pub use normalize::{bounded_downscale, normalize_channels};
pub use raster::{Raster, ScaleContext, CANONICAL_CHANNELS};

#[cfg(feature = "onnx")]
pub use onnx::{preferred_device, OnnxYoloConfig, OnnxYoloDetector};
