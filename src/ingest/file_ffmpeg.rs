//! Local file frame source using FFmpeg.
//!
//! FFmpeg-backed decoder for `FileSource`. Frames are decoded in-memory
//! and scaled to tightly packed RGB24 before handoff.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::FileConfig;
use super::SourceStats;
use crate::frame::{Frame, VideoParams};

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    params: VideoParams,
    frame_count: u64,
    flushed: bool,
    connected: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("could not open capture source {}", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let fps = stream_fps(&input_stream);
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
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

        let params = VideoParams::new(fps, decoder.width(), decoder.height())?;

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            params,
            frame_count: 0,
            flushed: false,
            connected: false,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "FileSource: connected to {} ({}x{} @ {:.2} fps)",
            self.config.path,
            self.params.width,
            self.params.height,
            self.params.fps
        );
        Ok(())
    }

    pub(crate) fn params(&self) -> Result<VideoParams> {
        if !self.connected {
            return Err(anyhow!("source not connected; call connect() first"));
        }
        Ok(self.params)
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("source not connected; call connect() first"));
        }
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                let frame = Frame::new(pixels, width, height, self.frame_count)?;
                self.frame_count += 1;
                return Ok(Some(frame));
            }

            if self.flushed {
                return Ok(None);
            }

            let mut fed_packet = false;
            while let Some((stream, packet)) = self.input.packets().next() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                fed_packet = true;
                break;
            }
            if !fed_packet {
                self.decoder.send_eof().context("flush ffmpeg decoder")?;
                self.flushed = true;
            }
        }
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.path.clone(),
        }
    }
}

fn stream_fps(stream: &ffmpeg::format::stream::Stream) -> f64 {
    let avg = stream.avg_frame_rate();
    if avg.denominator() != 0 && avg.numerator() > 0 {
        return f64::from(avg.numerator()) / f64::from(avg.denominator());
    }
    let rate = stream.rate();
    if rate.denominator() != 0 && rate.numerator() > 0 {
        return f64::from(rate.numerator()) / f64::from(rate.denominator());
    }
    log::warn!("stream reports no frame rate; assuming 30 fps");
    30.0
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
