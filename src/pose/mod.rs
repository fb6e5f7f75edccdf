pub mod angle;
pub mod estimator;
pub mod landmark;

pub use angle::elbow_angle;
#[cfg(feature = "onnx")]
pub use estimator::MoveNetEstimator;
pub use estimator::PoseEstimator;
pub use landmark::{Landmark, LandmarkIndex, Landmarks};
