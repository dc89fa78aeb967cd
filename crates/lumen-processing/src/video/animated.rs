use crate::error::ProcessingError;
use crate::image::scale::scale;
use crate::source::SourceLocation;
use crate::traits::{Derivative, DerivativeGenerator, DerivativeRequest};
use crate::video::frames::{FfmpegFrameSource, FrameSource};
use crate::video::probe::probe_video;
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use lumen_core::{Dimension, FrameWindow};
use std::ops::{Deref, DerefMut};

/// NeuQuant sampling speed for palette quantization (1 = best, 30 = fastest).
const GIF_ENCODE_SPEED: i32 = 10;

pub const GIF_EXTENSION: &str = "gif";
pub const GIF_CONTENT_TYPE: &str = "image/gif";

/// Owns a frame source and closes it exactly once, on every exit path.
struct CloseOnDrop<S: FrameSource>(S);

impl<S: FrameSource> Deref for CloseOnDrop<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.0
    }
}

impl<S: FrameSource> DerefMut for CloseOnDrop<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.0
    }
}

impl<S: FrameSource> Drop for CloseOnDrop<S> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Sample frames from `source` and encode them as a looping GIF that fits `bound`.
///
/// The window is first fitted to the source length. Starting at `window.start`, up to
/// `window.count` decode attempts are made; after each decoded frame at position `p`
/// the source seeks to `p + sample_stride`. Attempts that yield no frame are skipped, and
/// so is a frame that fails to decode: the source seeks one past it and sampling goes on.
/// Only seek and open failures abort the encode. The source is closed before returning.
pub fn encode_animation<S: FrameSource>(
    source: S,
    bound: Dimension,
    window: FrameWindow,
) -> Result<Vec<u8>, ProcessingError> {
    let mut source = CloseOnDrop(source);

    let length = source.length_in_frames();
    let window = window.fit_to(length);

    let output_size = scale(source.native_size(), bound);
    if output_size.is_empty() {
        return Err(ProcessingError::Decode(format!(
            "video frame size {} cannot be scaled into {}",
            source.native_size(),
            bound
        )));
    }
    source.set_output_size(output_size);
    source.seek(window.start)?;

    let delay = Delay::from_numer_denom_ms(1000, window.frame_rate.max(1));
    let stride = window.sample_stride.max(1);
    let mut buffer = Vec::new();
    let mut appended = 0u32;

    {
        let mut encoder = GifEncoder::new_with_speed(&mut buffer, GIF_ENCODE_SPEED);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ProcessingError::Encode(e.to_string()))?;

        for _ in 0..window.count {
            let position = source.position();
            match source.grab() {
                Ok(Some(frame)) => {
                    encoder
                        .encode_frame(Frame::from_parts(frame, 0, 0, delay))
                        .map_err(|e| ProcessingError::Encode(e.to_string()))?;
                    appended += 1;
                    source.seek(position.saturating_add(stride))?;
                }
                Ok(None) => {
                    tracing::debug!(position, "No frame decoded, skipping");
                }
                Err(e) => {
                    tracing::warn!(position, error = %e, "Frame failed to decode, skipping");
                    source.seek(position.saturating_add(1))?;
                }
            }
        }
    }

    if appended == 0 {
        return Err(ProcessingError::Decode(format!(
            "no frames decoded from window starting at {} ({} frames in source)",
            window.start, length
        )));
    }

    tracing::debug!(
        frames = appended,
        start = window.start,
        stride,
        size = %output_size,
        gif_bytes = buffer.len(),
        "Encoded animated derivative"
    );

    Ok(buffer)
}

/// Animated GIF generator for videos.
#[derive(Debug, Clone)]
pub struct AnimatedDerivativeGenerator {
    ffmpeg_path: String,
    ffprobe_path: String,
    window: FrameWindow,
}

impl AnimatedDerivativeGenerator {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        ffprobe_path: impl Into<String>,
        window: FrameWindow,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            window,
        }
    }
}

#[async_trait]
impl DerivativeGenerator for AnimatedDerivativeGenerator {
    async fn generate(
        &self,
        source_url: &str,
        request: &DerivativeRequest,
    ) -> Result<Derivative, ProcessingError> {
        let location = SourceLocation::parse(source_url)?;
        let probe = probe_video(&self.ffprobe_path, &location).await?;

        let frames = FfmpegFrameSource::new(self.ffmpeg_path.clone(), location, probe);
        let bound = request.bound;
        let window = self.window;

        let encoded =
            tokio::task::spawn_blocking(move || encode_animation(frames, bound, window)).await??;

        Ok(Derivative {
            bytes: Bytes::from(encoded),
            extension: GIF_EXTENSION.to_string(),
            content_type: GIF_CONTENT_TYPE.to_string(),
        })
    }
}
