use anyhow::Result;
use image::RgbImage;

use super::landmark::Landmarks;

/// Per-frame pose oracle.
///
/// Implementations run full-body pose estimation on a single RGB frame and
/// return the 17-landmark set, or `None` when no person was detected. The
/// model behind the seam is opaque to the rest of the system.
pub trait PoseEstimator: Send {
    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>>;
}

#[cfg(feature = "onnx")]
pub use movenet::MoveNetEstimator;

#[cfg(feature = "onnx")]
mod movenet {
    use std::path::Path;

    use anyhow::{Context, Result};
    use image::imageops::FilterType;
    use image::RgbImage;
    use ndarray::Array4;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;

    use crate::pose::landmark::{Landmark, LandmarkIndex, Landmarks};
    use crate::pose::PoseEstimator;

    /// MoveNet input size.
    pub const MOVENET_INPUT_SIZE: u32 = 192;

    /// MoveNet Lightning single-pose estimator via ONNX Runtime.
    pub struct MoveNetEstimator {
        session: Session,
    }

    impl MoveNetEstimator {
        /// Load the ONNX model and build a session.
        pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(model_path.as_ref())
                .context("Failed to load ONNX model")?;

            Ok(Self { session })
        }

        /// Resize to 192x192 and lay out as a [1, 192, 192, 3] f32 tensor
        /// (0.0-255.0), the layout MoveNet expects.
        fn preprocess(frame: &RgbImage) -> Array4<f32> {
            let size = MOVENET_INPUT_SIZE;
            let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);

            let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
            for (x, y, pixel) in resized.enumerate_pixels() {
                for c in 0..3 {
                    tensor[[0, y as usize, x as usize, c]] = f32::from(pixel[c]);
                }
            }
            tensor
        }
    }

    impl PoseEstimator for MoveNetEstimator {
        fn estimate(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>> {
            let input = Self::preprocess(frame);
            let input_tensor = Tensor::from_array(input)?;
            let outputs = self
                .session
                .run(ort::inputs!["serving_default_input_0" => input_tensor])
                .context("Inference failed")?;

            // MoveNet output is [1, 1, 17, 3] as (y, x, confidence).
            let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
                .try_extract_array()
                .context("Failed to extract output tensor")?;

            let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
            for (i, landmark) in landmarks.iter_mut().enumerate() {
                let y = output[[0, 0, i, 0]];
                let x = output[[0, 0, i, 1]];
                let confidence = output[[0, 0, i, 2]];
                *landmark = Landmark::new(x, y, confidence);
            }

            let landmarks = Landmarks::new(landmarks);
            if landmarks.is_empty() {
                Ok(None)
            } else {
                Ok(Some(landmarks))
            }
        }
    }
}
