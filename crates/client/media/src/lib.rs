//! Camera, compositing and frame uplink for the presenter client.
pub mod camera;
pub mod segmentation;
pub mod uplink;

pub use camera::CameraResource;
pub use segmentation::SegmentationPipeline;
pub use uplink::{FrameUplink, encode_jpeg};
