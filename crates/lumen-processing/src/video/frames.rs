//! Frame-addressable video decoding.

use crate::error::ProcessingError;
use crate::source::SourceLocation;
use crate::video::probe::VideoProbe;
use image::RgbaImage;
use lumen_core::Dimension;
use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Network read timeout handed to ffmpeg, in microseconds.
const RW_TIMEOUT_MICROS: &str = "30000000";

/// A decoder that can be positioned on a frame index and yields RGBA frames.
///
/// Implementations must tolerate `close` being called at most once by the owner
/// and then being dropped.
pub trait FrameSource: Send {
    fn length_in_frames(&self) -> u32;

    fn native_size(&self) -> Dimension;

    /// Size frames are scaled to before `grab` returns them.
    fn set_output_size(&mut self, size: Dimension);

    /// Index of the frame the next `grab` decodes.
    fn position(&self) -> u32;

    fn seek(&mut self, frame: u32) -> Result<(), ProcessingError>;

    /// Decode the frame at the current position and advance by one.
    /// `Ok(None)` when no frame could be decoded there.
    fn grab(&mut self) -> Result<Option<RgbaImage>, ProcessingError>;

    fn close(&mut self);
}

struct FramePipe {
    child: Child,
    stdout: ChildStdout,
}

/// `FrameSource` backed by an ffmpeg child process writing raw RGBA to a pipe.
///
/// Forward seeks read and discard frames; backward seeks restart ffmpeg with a
/// `select` filter starting at the target frame.
pub struct FfmpegFrameSource {
    ffmpeg_path: String,
    source: SourceLocation,
    probe: VideoProbe,
    output_size: Dimension,
    pipe: Option<FramePipe>,
    position: u32,
    exhausted: bool,
    closed: bool,
}

impl FfmpegFrameSource {
    pub fn new(ffmpeg_path: impl Into<String>, source: SourceLocation, probe: VideoProbe) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            source,
            output_size: probe.size,
            probe,
            pipe: None,
            position: 0,
            exhausted: false,
            closed: false,
        }
    }

    fn frame_len(&self) -> usize {
        self.output_size.width as usize * self.output_size.height as usize * 4
    }

    fn spawn(&self, from: u32) -> Result<FramePipe, ProcessingError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command.args(["-v", "error", "-nostdin"]);
        if self.source.is_remote() {
            command.args(["-rw_timeout", RW_TIMEOUT_MICROS]);
        }
        command
            .arg("-i")
            .arg(self.source.as_input())
            .args(["-an", "-sn", "-vf"])
            .arg(filter_graph(from, self.output_size))
            .args([
                "-vsync",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = command
            .spawn()
            .map_err(|e| ProcessingError::Decode(format!("Failed to start ffmpeg: {}", e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessingError::Decode("ffmpeg stdout unavailable".to_string()))?;

        tracing::debug!(from_frame = from, size = %self.output_size, "Started ffmpeg frame pipe");
        Ok(FramePipe { child, stdout })
    }

    fn restart_at(&mut self, frame: u32) -> Result<(), ProcessingError> {
        self.stop();
        self.pipe = Some(self.spawn(frame)?);
        self.position = frame;
        self.exhausted = false;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut pipe) = self.pipe.take() {
            let _ = pipe.child.kill();
            let _ = pipe.child.wait();
        }
    }

    fn ensure_open(&self) -> Result<(), ProcessingError> {
        if self.closed {
            return Err(ProcessingError::Decode("frame source is closed".to_string()));
        }
        if self.output_size.is_empty() {
            return Err(ProcessingError::Decode(format!(
                "cannot decode frames at size {}",
                self.output_size
            )));
        }
        Ok(())
    }
}

/// Video filter that drops frames before `from` and scales the rest.
fn filter_graph(from: u32, size: Dimension) -> String {
    format!("select=gte(n\\,{}),scale={}:{}", from, size.width, size.height)
}

/// Fill `buf` with one frame. `false` at end of stream, including a truncated last frame.
fn read_frame(stdout: &mut ChildStdout, buf: &mut [u8]) -> Result<bool, ProcessingError> {
    match stdout.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(ProcessingError::Decode(format!("Failed to read frame: {}", e))),
    }
}

impl FrameSource for FfmpegFrameSource {
    fn length_in_frames(&self) -> u32 {
        self.probe.length_in_frames
    }

    fn native_size(&self) -> Dimension {
        self.probe.size
    }

    fn set_output_size(&mut self, size: Dimension) {
        if size != self.output_size {
            self.stop();
            self.output_size = size;
        }
    }

    fn position(&self) -> u32 {
        self.position
    }

    fn seek(&mut self, frame: u32) -> Result<(), ProcessingError> {
        self.ensure_open()?;

        if frame >= self.position && (self.exhausted || self.pipe.is_some()) {
            let mut scratch = vec![0u8; self.frame_len()];
            while self.position < frame && !self.exhausted {
                let Some(pipe) = self.pipe.as_mut() else {
                    break;
                };
                if read_frame(&mut pipe.stdout, &mut scratch)? {
                    self.position += 1;
                } else {
                    self.exhausted = true;
                }
            }
            self.position = frame;
            return Ok(());
        }

        self.restart_at(frame)
    }

    fn grab(&mut self) -> Result<Option<RgbaImage>, ProcessingError> {
        self.ensure_open()?;
        if self.exhausted {
            self.position = self.position.saturating_add(1);
            return Ok(None);
        }
        if self.pipe.is_none() {
            self.restart_at(self.position)?;
        }

        let mut buf = vec![0u8; self.frame_len()];
        let read = match self.pipe.as_mut() {
            Some(pipe) => read_frame(&mut pipe.stdout, &mut buf),
            None => Ok(false),
        };
        let got_frame = match read {
            Ok(got_frame) => got_frame,
            Err(e) => {
                // The pipe is out of step now; the next seek restarts ffmpeg.
                self.stop();
                return Err(e);
            }
        };
        self.position = self.position.saturating_add(1);

        if !got_frame {
            self.exhausted = true;
            return Ok(None);
        }

        RgbaImage::from_raw(self.output_size.width, self.output_size.height, buf)
            .map(Some)
            .ok_or_else(|| ProcessingError::Decode("frame buffer has the wrong size".to_string()))
    }

    fn close(&mut self) {
        self.stop();
        self.closed = true;
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}
