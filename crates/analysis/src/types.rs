//! Request and response model of the analyze call.
//!
//! ```text
//! AnalysisRequest { image_url, features = [Faces], subscription_key }
//!        │
//!        ▼
//! AnalysisResult
//! ├── faces: Option<Vec<FaceDetection>>   absent ≠ empty
//! │     └── FaceDetection { age, gender, rectangle { left, top, width, height } }
//! ├── request_id
//! └── metadata { width, height, format }
//! ```
use std::fmt;

use serde::{Deserialize, Serialize};

/// Analysis features. Only face detection is ever requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualFeature {
    Faces,
}

impl VisualFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualFeature::Faces => "Faces",
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// URL the service reads the image from, grant included when one was made.
    pub image_url: String,
    pub features: Vec<VisualFeature>,
    pub subscription_key: String,
}

impl AnalysisRequest {
    /// A face-detection request.
    pub fn faces(image_url: impl Into<String>, subscription_key: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            features: vec![VisualFeature::Faces],
            subscription_key: subscription_key.into(),
        }
    }

    pub(crate) fn features_param(&self) -> String {
        self.features
            .iter()
            .map(VisualFeature::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("features", &self.features)
            .field("subscription_key", &"***")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaceRectangle {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceDetection {
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub gender: String,
    #[serde(rename = "faceRectangle")]
    pub rectangle: FaceRectangle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageMetadata {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// `None` when the service returned no face data at all.
    #[serde(default)]
    pub faces: Option<Vec<FaceDetection>>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<ImageMetadata>,
}

impl AnalysisResult {
    pub fn face_count(&self) -> usize {
        self.faces.as_ref().map_or(0, Vec::len)
    }
}
