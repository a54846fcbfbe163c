//! Output video sink.
//!
//! `VideoSink` accepts annotated frames in presentation order and encodes
//! them into a VP8/WebM file whose rate and geometry match the input
//! stream (feature: video-ffmpeg). `stub://` output paths select a
//! counting memory sink for tests.
//!
//! The sink must be released on every exit path: `finish()` closes the
//! container on success, and dropping an unfinished sink releases the
//! encoder without writing a trailer.

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::frame::VideoParams;

/// Report returned when a sink is finished.
#[derive(Clone, Debug)]
pub struct SinkReport {
    pub path: String,
    pub frames_written: u64,
}

/// Output video sink with a fixed codec identity (VP8 in WebM).
pub enum VideoSink {
    Memory(MemorySink),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(ffmpeg_sink::FfmpegSink),
}

impl VideoSink {
    /// Open a sink at `path` with the source's parameters.
    pub fn open(path: &str, params: VideoParams) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(anyhow!("output path is empty"));
        }
        if path.starts_with("stub://") {
            return Ok(Self::Memory(MemorySink::new(path, params)));
        }
        #[cfg(feature = "video-ffmpeg")]
        {
            Ok(Self::Ffmpeg(ffmpeg_sink::FfmpegSink::open(path, params)?))
        }
        #[cfg(not(feature = "video-ffmpeg"))]
        {
            Err(anyhow!("video output requires the video-ffmpeg feature"))
        }
    }

    /// Append one frame. Frames must match the sink's geometry.
    pub fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        match self {
            Self::Memory(sink) => sink.write_frame(image),
            #[cfg(feature = "video-ffmpeg")]
            Self::Ffmpeg(sink) => sink.write_frame(image),
        }
    }

    /// Flush and close the sink, reporting where the output landed and how
    /// many frames it holds.
    pub fn finish(self) -> Result<SinkReport> {
        match self {
            Self::Memory(sink) => Ok(sink.finish()),
            #[cfg(feature = "video-ffmpeg")]
            Self::Ffmpeg(sink) => sink.finish(),
        }
    }
}

// ----------------------------------------------------------------------------
// Counting memory sink (stub://) for tests
// ----------------------------------------------------------------------------

pub struct MemorySink {
    path: String,
    params: VideoParams,
    frames_written: u64,
}

impl MemorySink {
    fn new(path: &str, params: VideoParams) -> Self {
        Self {
            path: path.to_string(),
            params,
            frames_written: 0,
        }
    }

    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        let (width, height) = image.dimensions();
        if width != self.params.width || height != self.params.height {
            return Err(anyhow!(
                "frame {}x{} does not match sink {}x{}",
                width,
                height,
                self.params.width,
                self.params.height
            ));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(self) -> SinkReport {
        SinkReport {
            path: self.path,
            frames_written: self.frames_written,
        }
    }
}

// ----------------------------------------------------------------------------
// FFmpeg encoder sink
// ----------------------------------------------------------------------------

#[cfg(feature = "video-ffmpeg")]
mod ffmpeg_sink {
    use super::SinkReport;
    use crate::frame::VideoParams;
    use anyhow::{anyhow, Context, Result};
    use ffmpeg_next as ffmpeg;
    use image::RgbImage;

    pub struct FfmpegSink {
        path: String,
        params: VideoParams,
        output: ffmpeg::format::context::Output,
        encoder: ffmpeg::codec::encoder::Video,
        scaler: ffmpeg::software::scaling::Context,
        encoder_time_base: ffmpeg::Rational,
        stream_time_base: ffmpeg::Rational,
        frames_written: u64,
    }

    impl FfmpegSink {
        pub fn open(path: &str, params: VideoParams) -> Result<Self> {
            ffmpeg::init().context("initialize ffmpeg")?;
            let mut output = ffmpeg::format::output(&path)
                .with_context(|| format!("could not open output video {}", path))?;

            let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::VP8)
                .ok_or_else(|| anyhow!("VP8 encoder not available"))?;
            let global_header = output
                .format()
                .flags()
                .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);
            let mut stream = output.add_stream(codec).context("add output stream")?;

            let fps = fps_rational(params.fps);
            let encoder_time_base = fps.invert();

            let mut encoder =
                ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                    .context("create encoder context")?
                    .encoder()
                    .video()
                    .context("open video encoder context")?;
            encoder.set_width(params.width);
            encoder.set_height(params.height);
            encoder.set_format(ffmpeg::util::format::pixel::Pixel::YUV420P);
            encoder.set_time_base(encoder_time_base);
            encoder.set_frame_rate(Some(fps));
            if global_header {
                encoder.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
            }

            let encoder = encoder.open_as(codec).context("open VP8 encoder")?;
            stream.set_parameters(&encoder);
            stream.set_time_base(encoder_time_base);

            output.write_header().context("write output header")?;
            let stream_time_base = output
                .stream(0)
                .map(|stream| stream.time_base())
                .unwrap_or(encoder_time_base);

            let scaler = ffmpeg::software::scaling::context::Context::get(
                ffmpeg::util::format::pixel::Pixel::RGB24,
                params.width,
                params.height,
                ffmpeg::util::format::pixel::Pixel::YUV420P,
                params.width,
                params.height,
                ffmpeg::software::scaling::flag::Flags::BILINEAR,
            )
            .context("create ffmpeg scaler")?;

            Ok(Self {
                path: path.to_string(),
                params,
                output,
                encoder,
                scaler,
                encoder_time_base,
                stream_time_base,
                frames_written: 0,
            })
        }

        pub fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
            let (width, height) = image.dimensions();
            if width != self.params.width || height != self.params.height {
                return Err(anyhow!(
                    "frame {}x{} does not match sink {}x{}",
                    width,
                    height,
                    self.params.width,
                    self.params.height
                ));
            }

            let mut rgb_frame =
                ffmpeg::frame::Video::new(ffmpeg::util::format::pixel::Pixel::RGB24, width, height);
            copy_rgb_into_frame(image, &mut rgb_frame);

            let mut yuv_frame = ffmpeg::frame::Video::empty();
            self.scaler
                .run(&rgb_frame, &mut yuv_frame)
                .context("scale frame to YUV420P")?;
            yuv_frame.set_pts(Some(self.frames_written as i64));

            self.encoder
                .send_frame(&yuv_frame)
                .context("send frame to VP8 encoder")?;
            self.drain_packets()?;
            self.frames_written += 1;
            Ok(())
        }

        pub fn finish(mut self) -> Result<SinkReport> {
            self.encoder.send_eof().context("flush VP8 encoder")?;
            self.drain_packets()?;
            self.output.write_trailer().context("write output trailer")?;
            Ok(SinkReport {
                path: self.path,
                frames_written: self.frames_written,
            })
        }

        fn drain_packets(&mut self) -> Result<()> {
            let mut packet = ffmpeg::Packet::empty();
            while self.encoder.receive_packet(&mut packet).is_ok() {
                packet.set_stream(0);
                packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
                packet
                    .write_interleaved(&mut self.output)
                    .context("write encoded packet")?;
            }
            Ok(())
        }
    }

    fn fps_rational(fps: f64) -> ffmpeg::Rational {
        ffmpeg::Rational((fps * 1000.0).round() as i32, 1000)
    }

    fn copy_rgb_into_frame(image: &RgbImage, frame: &mut ffmpeg::frame::Video) {
        let (width, height) = image.dimensions();
        let row_bytes = (width as usize) * 3;
        let stride = frame.stride(0);
        let data = frame.data_mut(0);
        let pixels = image.as_raw();
        for row in 0..height as usize {
            let src = row * row_bytes;
            let dst = row * stride;
            data[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_counts_frames() {
        let params = VideoParams::new(24.0, 8, 6).unwrap();
        let mut sink = VideoSink::open("stub://out", params).unwrap();
        for _ in 0..5 {
            sink.write_frame(&RgbImage::new(8, 6)).unwrap();
        }
        let report = sink.finish().unwrap();
        assert_eq!(report.frames_written, 5);
        assert_eq!(report.path, "stub://out");
    }

    #[test]
    fn memory_sink_rejects_mismatched_geometry() {
        let params = VideoParams::new(24.0, 8, 6).unwrap();
        let mut sink = VideoSink::open("stub://out", params).unwrap();
        assert!(sink.write_frame(&RgbImage::new(4, 4)).is_err());
    }
}
