//! Face detection for the image a blob event points at.
//!
//! One [`ImageAnalyzer::analyze`] call per event, no retries. The result keeps
//! "no face data" (`faces: None`) apart from "no faces found"
//! (`faces: Some(vec![])`).

pub mod client;
pub mod error;
pub mod types;

pub use client::{ComputerVisionClient, ImageAnalyzer};
pub use error::AnalysisError;
pub use types::{
    AnalysisRequest, AnalysisResult, FaceDetection, FaceRectangle, ImageMetadata, VisualFeature,
};
