//! Elbow-angle geometry.
//!
//! The angle at the elbow is the difference between the signed directions of
//! the elbow→wrist and elbow→shoulder vectors. Values above 180° are
//! reflected back (`360 − angle`), so the result is always in [0, 180]:
//! 180° = arm fully extended, small angles = arm flexed.

/// Elbow angle in degrees from 2-D shoulder/elbow/wrist coordinates.
pub fn elbow_angle(shoulder: (f32, f32), elbow: (f32, f32), wrist: (f32, f32)) -> f32 {
    let radians = f32::atan2(wrist.1 - elbow.1, wrist.0 - elbow.0)
        - f32::atan2(shoulder.1 - elbow.1, shoulder.0 - elbow.0);
    let mut angle = radians.to_degrees().abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    angle
}
