//! Animated derivatives sampled from video frames.

pub mod animated;
pub mod frames;
pub mod probe;

pub use animated::{encode_animation, AnimatedDerivativeGenerator};
pub use frames::{FfmpegFrameSource, FrameSource};
pub use probe::{probe_video, VideoProbe};
