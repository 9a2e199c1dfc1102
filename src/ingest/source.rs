use anyhow::Result;

use crate::frame::Frame;

/// Outcome of one `FrameSource::read` call.
#[derive(Debug)]
pub enum SourceRead {
    /// A decoded frame.
    Frame(Frame),
    /// The source is live but had nothing this tick. Skipped silently.
    Empty,
    /// The stream is over (end of file, device gone). Triggers teardown.
    Ended,
}

/// A video source the capture loop pulls frames from.
///
/// The engine calls `open`/`close` from the lifecycle thread and `read` from the
/// capture thread, never concurrently. Implementations must tolerate any number
/// of `close` → `open` cycles, and `close` on an already closed source.
///
/// An `Err` from `read` is treated exactly like `SourceRead::Ended`.
pub trait FrameSource: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Start delivering frames from `identifier` (device node, path, URL).
    fn open(&mut self, identifier: &str) -> Result<()>;

    /// Fetch the next frame. May block for up to one frame interval.
    fn read(&mut self) -> Result<SourceRead>;

    /// Native frame rate, if the source can report one.
    fn frame_rate(&self) -> Option<f64>;

    /// Release the underlying device or file.
    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn open(&mut self, identifier: &str) -> Result<()> {
        (**self).open(identifier)
    }

    fn read(&mut self) -> Result<SourceRead> {
        (**self).read()
    }

    fn frame_rate(&self) -> Option<f64> {
        (**self).frame_rate()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
