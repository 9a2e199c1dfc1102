//! Files and network streams decoded with FFmpeg.
//!
//! Every decoded frame is converted to packed RGB24 at its native size. Once the
//! demuxer runs dry the decoder is flushed, and `read` reports `Ended` after the
//! last buffered frame.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::source::{FrameSource, SourceRead};
use crate::frame::Frame;

struct OpenInput {
    identifier: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    fps: Option<f64>,
    flushed: bool,
    frame_count: u64,
}

/// FFmpeg-backed frame source.
#[derive(Default)]
pub struct FfmpegSource {
    current: Option<OpenInput>,
}

impl FfmpegSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for FfmpegSource {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn open(&mut self, identifier: &str) -> Result<()> {
        self.close();
        ffmpeg::init().context("initialize ffmpeg")?;

        let input = ffmpeg::format::input(&identifier)
            .with_context(|| format!("failed to open '{}' with ffmpeg", identifier))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("'{}' has no video track", identifier))?;
        let stream_index = stream.index();
        let fps = rational_fps(stream.avg_frame_rate()).or_else(|| rational_fps(stream.rate()));

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;
        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FfmpegSource: opened {} ({}x{}, fps={:?})",
            identifier,
            decoder.width(),
            decoder.height(),
            fps
        );

        self.current = Some(OpenInput {
            identifier: identifier.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            fps,
            flushed: false,
            frame_count: 0,
        });
        Ok(())
    }

    fn read(&mut self) -> Result<SourceRead> {
        let open = self.current.as_mut().context("ffmpeg input not open")?;
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            if open.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb = ffmpeg::frame::Video::empty();
                open.scaler
                    .run(&decoded, &mut rgb)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb)?;
                open.frame_count += 1;
                return Ok(SourceRead::Frame(Frame::from_rgb(width, height, pixels)?));
            }

            if open.flushed {
                return Ok(SourceRead::Ended);
            }

            match open.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != open.stream_index {
                        continue;
                    }
                    open.decoder
                        .send_packet(&packet)
                        .context("send packet to ffmpeg decoder")?;
                }
                None => {
                    open.decoder.send_eof().context("flush ffmpeg decoder")?;
                    open.flushed = true;
                }
            }
        }
    }

    fn frame_rate(&self) -> Option<f64> {
        self.current.as_ref().and_then(|open| open.fps)
    }

    fn close(&mut self) {
        if let Some(open) = self.current.take() {
            log::info!(
                "FfmpegSource: closed {} after {} frames",
                open.identifier,
                open.frame_count
            );
        }
    }
}

fn rational_fps(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    Some(rate.numerator() as f64 / rate.denominator() as f64)
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    Ok((pixels, width, height))
}
