pub mod camera;
pub mod detector;
pub mod handoff;

pub use camera::{CameraStream, first_camera, start_camera_stream};
pub use detector::{DetectorConfig, OrtHandDetector, start_detection};
pub use handoff::{HandReader, hand_slot};
