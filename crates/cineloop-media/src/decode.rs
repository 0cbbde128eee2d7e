// crates/cineloop-media/src/decode.rs
//
// FrameDecoder: stateful sequential video decoder for one file. Opened at a
// position, then read forward. Scaling to RGBA is skipped for frames that are
// only decoded to reach a target (burn), which is ~4x cheaper than scaling
// every GOP frame after a keyframe-aligned seek.

use std::path::Path;

use anyhow::{anyhow, Result};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::video::Video;

use crate::helpers::seek::seek_to_ms;
use crate::probe::{ms_to_pts, pts_to_ms};

/// Widest frame handed to the UI; larger sources are scaled down.
const MAX_OUTPUT_WIDTH: u32 = 1_280;

/// One decoded, scaled RGBA frame.
#[derive(Clone)]
pub struct VideoFrame {
    pub pts_ms: u64,
    pub width:  u32,
    pub height: u32,
    /// Tightly packed RGBA, `width * height * 4` bytes.
    pub rgba:   Vec<u8>,
    /// Pipeline generation that produced this frame; stale generations are
    /// dropped by the session.
    pub(crate) generation: u64,
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("pts_ms", &self.pts_ms)
            .field("size", &(self.width, self.height))
            .finish()
    }
}

pub(crate) struct FrameDecoder {
    ictx:        ffmpeg::format::context::Input,
    decoder:     ffmpeg::decoder::video::Video,
    video_idx:   usize,
    tb_num:      i32,
    tb_den:      i32,
    out_w:       u32,
    out_h:       u32,
    scaler:      SwsContext,
    last_pts:    i64,
    flushed:     bool,
}

impl FrameDecoder {
    pub fn open(path: &Path, start_ms: u64) -> Result<Self> {
        let mut ictx = input(path)?;
        let video_idx = ictx.streams().best(Type::Video)
            .ok_or_else(|| anyhow!("no video stream"))?
            .index();

        let (tb_num, tb_den, decoder) = {
            let stream = ictx.stream(video_idx).ok_or_else(|| anyhow!("stream gone"))?;
            let tb = stream.time_base();
            let ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
            (tb.numerator(), tb.denominator(), ctx.decoder().video()?)
        };

        seek_to_ms(&mut ictx, start_ms, "decode");

        let (out_w, out_h) = output_size(decoder.width(), decoder.height());
        let scaler = SwsContext::get(
            decoder.format(), decoder.width(), decoder.height(),
            Pixel::RGBA, out_w, out_h, Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx, decoder, video_idx, tb_num, tb_den, out_w, out_h, scaler,
            last_pts: ms_to_pts(start_ms, tb_num, tb_den),
            flushed:  false,
        })
    }

    pub fn last_ms(&self) -> u64 {
        pts_to_ms(self.last_pts, self.tb_num, self.tb_den)
    }

    /// Next frame in decode order, scaled. `None` at end of stream.
    pub fn next_frame(&mut self) -> Option<VideoFrame> {
        let decoded = self.next_decoded()?;
        self.scale(&decoded)
    }

    /// Decode forward (without scaling) until a frame at or past `target_ms`,
    /// then scale and return it. Returns the last frame if the stream ends
    /// first.
    pub fn frame_at(&mut self, target_ms: u64) -> Option<VideoFrame> {
        let target_pts = ms_to_pts(target_ms, self.tb_num, self.tb_den);
        let mut last: Option<Video> = None;
        while let Some(decoded) = self.next_decoded() {
            let reached = decoded.pts().map_or(true, |pts| pts >= target_pts);
            if reached {
                return self.scale(&decoded);
            }
            last = Some(decoded);
        }
        last.and_then(|d| self.scale(&d))
    }

    fn next_decoded(&mut self) -> Option<Video> {
        let mut decoded = Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.pts().unwrap_or(self.last_pts + 1);
                self.last_pts = pts;
                return Some(decoded);
            }
            if self.flushed {
                return None;
            }
            let idx = self.video_idx;
            match self.ictx.packets().flatten().find(|(s, _)| s.index() == idx) {
                Some((_, packet)) => {
                    // A corrupt packet is skipped, not fatal.
                    let _ = self.decoder.send_packet(&packet);
                }
                None => {
                    // Drain frames still buffered in the decoder.
                    let _ = self.decoder.send_eof();
                    self.flushed = true;
                }
            }
        }
    }

    fn scale(&mut self, decoded: &Video) -> Option<VideoFrame> {
        let mut out = Video::empty();
        self.scaler.run(decoded, &mut out).ok()?;
        // Copy visible pixels only, not stride padding.
        let stride    = out.stride(0);
        let raw       = out.data(0);
        let row_bytes = self.out_w as usize * 4;
        let rgba: Vec<u8> = (0..self.out_h as usize)
            .flat_map(|row| &raw[row * stride..row * stride + row_bytes])
            .copied()
            .collect();
        Some(VideoFrame {
            pts_ms:     pts_to_ms(self.last_pts, self.tb_num, self.tb_den),
            width:      self.out_w,
            height:     self.out_h,
            rgba,
            generation: 0,
        })
    }
}

/// Source size capped at `MAX_OUTPUT_WIDTH`, aspect preserved, even height.
pub(crate) fn output_size(src_w: u32, src_h: u32) -> (u32, u32) {
    let (w, h) = (src_w.max(2), src_h.max(2));
    if w <= MAX_OUTPUT_WIDTH {
        return (w, h);
    }
    let scaled_h = ((MAX_OUTPUT_WIDTH as u64 * h as u64 / w as u64) as u32).max(2) & !1;
    (MAX_OUTPUT_WIDTH, scaled_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_sources_keep_their_size() {
        assert_eq!(output_size(640, 360), (640, 360));
        assert_eq!(output_size(0, 0), (2, 2));
    }

    #[test]
    fn large_sources_are_capped_with_even_height() {
        assert_eq!(output_size(1_920, 1_080), (1_280, 720));
        assert_eq!(output_size(4_096, 1_716), (1_280, 536));
    }
}
