// crates/cineloop-media/src/audio.rs
//
// Audio for a session: the first audio stream is decoded once to a temp WAV
// (44.1 kHz stereo f32le) on a background thread, then played through a
// rodio Sink that follows the session clock.
//
// The WAV lives in the OS temp dir as `cineloop_audio_<session uuid>.wav`
// and is deleted when the session closes.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::input;
use ffmpeg::format::sample::{Sample, Type as SampleType};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use uuid::Uuid;

const OUT_RATE: u32 = 44_100;
/// Packed (interleaved) f32: what rodio's WAV decoder expects.
const OUT_FMT: Sample = Sample::F32(SampleType::Packed);
const OUT_LAYOUT: ChannelLayout = ChannelLayout::STEREO;

const TEMP_PREFIX: &str = "cineloop_audio_";

/// Sink drift from the clock beyond which the sink is re-seeked.
const RESYNC_THRESHOLD_MS: u64 = 150;

// ── Extraction ────────────────────────────────────────────────────────────────

pub(crate) fn temp_wav_path(session: Uuid) -> PathBuf {
    std::env::temp_dir().join(format!("{TEMP_PREFIX}{session}.wav"))
}

/// Decode the audio of `src` into `dst`. Returns bytes written.
///
/// Samples stream straight to disk; memory use does not grow with the
/// length of the media.
pub(crate) fn extract_to_wav(src: &Path, dst: &Path) -> Result<u64> {
    let mut ictx = input(src).with_context(|| format!("open {}", src.display()))?;
    let audio_idx = ictx.streams().best(MediaType::Audio)
        .ok_or_else(|| anyhow!("no audio stream"))?
        .index();

    let mut decoder = {
        let stream = ictx.stream(audio_idx).ok_or_else(|| anyhow!("stream gone"))?;
        ffmpeg::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .audio()?
    };

    let file = File::create(dst).with_context(|| format!("create {}", dst.display()))?;
    let mut wav = WavWriter::new(BufWriter::new(file))?;
    // Built on the first frame, once the real source format is known.
    let mut resampler: Option<resampling::Context> = None;

    for (stream, packet) in ictx.packets().flatten() {
        if stream.index() != audio_idx { continue; }
        if decoder.send_packet(&packet).is_err() { continue; }
        let mut frame = AudioFrame::empty();
        while decoder.receive_frame(&mut frame).is_ok() {
            append_resampled(&frame, &mut resampler, &mut wav)?;
        }
        if wav.is_full() { break; }
    }

    let _ = decoder.send_eof();
    let mut frame = AudioFrame::empty();
    while decoder.receive_frame(&mut frame).is_ok() {
        append_resampled(&frame, &mut resampler, &mut wav)?;
    }

    if wav.is_full() {
        log::warn!("audio of {} exceeds the WAV size limit; the rest is silent", src.display());
    }
    let data_bytes = wav.data_bytes();
    wav.finish().with_context(|| format!("write {}", dst.display()))?;
    if data_bytes == 0 {
        let _ = std::fs::remove_file(dst);
        anyhow::bail!("no audio samples decoded");
    }
    Ok(WAV_HEADER_LEN + data_bytes)
}

fn append_resampled<W: Write + Seek>(
    frame:     &AudioFrame,
    resampler: &mut Option<resampling::Context>,
    out:       &mut WavWriter<W>,
) -> Result<()> {
    let src_channels = frame.ch_layout().channels();
    let passthrough = frame.format() == OUT_FMT
        && frame.rate() == OUT_RATE
        && src_channels == 2;
    if passthrough {
        out.write_frame(frame)?;
        return Ok(());
    }

    if resampler.is_none() {
        // Mono sources must be declared MONO or swr misreads the layout.
        let src_layout = if src_channels >= 2 { frame.ch_layout() } else { ChannelLayout::MONO };
        *resampler = Some(resampling::Context::get2(
            frame.format(), src_layout, frame.rate(),
            OUT_FMT,        OUT_LAYOUT, OUT_RATE,
        ).context("create audio resampler")?);
    }
    if let Some(rs) = resampler.as_mut() {
        let mut resampled = AudioFrame::empty();
        if rs.run(frame, &mut resampled).is_ok() && resampled.samples() > 0 {
            out.write_frame(&resampled)?;
        }
    }
    Ok(())
}

const WAV_HEADER_LEN: u64 = 44;
const WAV_CHANNELS:   u16 = 2;
const WAV_BITS:       u16 = 32;
const WAV_BLOCK:      u16 = WAV_CHANNELS * (WAV_BITS / 8);
/// Largest data chunk whose RIFF size (`36 + data`) still fits in a u32,
/// rounded down to whole sample frames. About 3 h 22 min at 44.1 kHz.
const WAV_MAX_DATA: u64 = (u32::MAX as u64 - 36) / WAV_BLOCK as u64 * WAV_BLOCK as u64;

/// Streaming writer for interleaved stereo f32le PCM (format tag 3, IEEE
/// float). The header goes out with zero sizes and is patched by `finish`.
struct WavWriter<W: Write + Seek> {
    out:        W,
    data_bytes: u64,
    limit:      u64,
}

impl<W: Write + Seek> WavWriter<W> {
    fn new(out: W) -> io::Result<Self> {
        Self::with_limit(out, WAV_MAX_DATA)
    }

    fn with_limit(mut out: W, limit: u64) -> io::Result<Self> {
        write_wav_header(&mut out, 0)?;
        Ok(Self { out, data_bytes: 0, limit })
    }

    fn data_bytes(&self) -> u64 { self.data_bytes }

    fn is_full(&self) -> bool { self.data_bytes >= self.limit }

    /// Append packed f32 bytes; anything past the size limit is dropped.
    fn write_samples(&mut self, bytes: &[u8]) -> io::Result<()> {
        let room = (self.limit - self.data_bytes.min(self.limit)) as usize;
        let take = bytes.len().min(room);
        let take = take - take % WAV_BLOCK as usize;
        self.out.write_all(&bytes[..take])?;
        self.data_bytes += take as u64;
        Ok(())
    }

    /// Only the sample bytes of plane 0; the plane itself is padded.
    fn write_frame(&mut self, frame: &AudioFrame) -> io::Result<()> {
        let data = frame.data(0);
        let len = (frame.samples() * WAV_BLOCK as usize).min(data.len());
        self.write_samples(&data[..len])
    }

    fn finish(mut self) -> io::Result<W> {
        self.out.seek(SeekFrom::Start(0))?;
        write_wav_header(&mut self.out, self.data_bytes)?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.flush()?;
        Ok(self.out)
    }
}

fn write_wav_header(w: &mut impl Write, data_bytes: u64) -> io::Result<()> {
    const FORMAT_FLOAT: u16 = 3;
    // In range: WAV_MAX_DATA + 36 fits in a u32.
    let data_size = data_bytes.min(WAV_MAX_DATA) as u32;
    let byte_rate = OUT_RATE * WAV_BLOCK as u32;

    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&FORMAT_FLOAT.to_le_bytes())?;
    w.write_all(&WAV_CHANNELS.to_le_bytes())?;
    w.write_all(&OUT_RATE.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&WAV_BLOCK.to_le_bytes())?;
    w.write_all(&WAV_BITS.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())
}

/// Delete a temp WAV written by `extract_to_wav`. Anything outside the temp
/// dir or not matching our naming is left alone.
pub(crate) fn cleanup_audio_temp(path: &Path) -> bool {
    let in_temp = path.parent().is_some_and(|p| p == std::env::temp_dir());
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    if !(in_temp && name.starts_with(TEMP_PREFIX) && name.ends_with(".wav")) {
        return false;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("removed temp audio {}", path.display());
            true
        }
        Err(e) => {
            log::warn!("could not remove temp audio {}: {e}", path.display());
            false
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// A rodio sink playing the extracted WAV.
pub(crate) struct AudioOutput {
    sink:    Sink,
    /// The device stream must outlive the sink.
    _stream: OutputStream,
}

impl AudioOutput {
    pub fn open(wav: &Path, at_ms: u64, speed: f32, volume: f32) -> Result<Self> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| anyhow!("audio device: {e}"))?;
        let file = File::open(wav).with_context(|| format!("open {}", wav.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| anyhow!("decode {}: {e}", wav.display()))?;

        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.append(source);
        sink.set_speed(speed);
        sink.set_volume(volume);
        let out = Self { sink, _stream: stream };
        out.seek(at_ms);
        Ok(out)
    }

    pub fn play(&self)  { self.sink.play(); }
    pub fn pause(&self) { self.sink.pause(); }
    pub fn set_speed(&self, speed: f32)   { self.sink.set_speed(speed); }
    pub fn set_volume(&self, volume: f32) { self.sink.set_volume(volume); }

    pub fn seek(&self, ms: u64) {
        if let Err(e) = self.sink.try_seek(Duration::from_millis(ms)) {
            log::warn!("audio seek to {ms} ms failed: {e}");
        }
    }

    /// Re-seek if the sink has drifted from the clock position.
    pub fn resync(&self, clock_ms: u64) {
        let sink_ms = self.sink.get_pos().as_millis() as u64;
        if sink_ms.abs_diff(clock_ms) > RESYNC_THRESHOLD_MS {
            log::debug!("audio drift {sink_ms} ms vs clock {clock_ms} ms; resyncing");
            self.seek(clock_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn le_u32(data: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
    }

    fn packed(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn streamed_wav_header_is_patched_on_finish() {
        let mut wav = WavWriter::new(Cursor::new(Vec::new())).unwrap();
        wav.write_samples(&packed(&[0.0, 0.5])).unwrap();
        wav.write_samples(&packed(&[-0.5, 1.0, 0.25, 0.25])).unwrap();
        assert_eq!(wav.data_bytes(), 24);
        let data = wav.finish().unwrap().into_inner();

        assert_eq!(data.len(), 44 + 24);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(le_u32(&data, 4), 36 + 24);
        assert_eq!(&data[8..12], b"WAVE");
        assert_eq!(u16::from_le_bytes([data[20], data[21]]), 3);
        assert_eq!(u16::from_le_bytes([data[22], data[23]]), 2);
        assert_eq!(le_u32(&data, 24), OUT_RATE);
        assert_eq!(&data[36..40], b"data");
        assert_eq!(le_u32(&data, 40), 24);
        assert_eq!(f32::from_le_bytes([data[48], data[49], data[50], data[51]]), 0.5);
    }

    #[test]
    fn streamed_wav_to_disk_matches_its_byte_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut wav = WavWriter::new(BufWriter::new(File::create(&path).unwrap())).unwrap();
        for _ in 0..100 {
            wav.write_samples(&packed(&[0.1; 64])).unwrap();
        }
        let bytes = WAV_HEADER_LEN + wav.data_bytes();
        drop(wav.finish().unwrap());

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len() as u64, bytes);
        assert_eq!(le_u32(&data, 40), 100 * 64 * 4);
        assert_eq!(le_u32(&data, 4) as u64, bytes - 8);
    }

    #[test]
    fn data_past_the_limit_is_dropped_on_frame_boundaries() {
        let mut wav = WavWriter::with_limit(Cursor::new(Vec::new()), 16).unwrap();
        wav.write_samples(&packed(&[0.1; 6])).unwrap();
        assert!(wav.is_full());
        wav.write_samples(&packed(&[0.2; 2])).unwrap();
        assert_eq!(wav.data_bytes(), 16);
        let data = wav.finish().unwrap().into_inner();
        assert_eq!(data.len(), 44 + 16);
        assert_eq!(le_u32(&data, 40), 16);
    }

    #[test]
    fn size_limit_keeps_riff_size_in_range() {
        assert_eq!(WAV_MAX_DATA % WAV_BLOCK as u64, 0);
        assert!(36 + WAV_MAX_DATA <= u32::MAX as u64);
        let mut header = Vec::new();
        write_wav_header(&mut header, u64::MAX).unwrap();
        assert_eq!(le_u32(&header, 40) as u64, WAV_MAX_DATA);
    }

    #[test]
    fn temp_paths_are_per_session() {
        let a = temp_wav_path(Uuid::new_v4());
        let b = temp_wav_path(Uuid::new_v4());
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(std::env::temp_dir().as_path()));
    }

    #[test]
    fn cleanup_removes_only_our_files() {
        let ours = temp_wav_path(Uuid::new_v4());
        std::fs::write(&ours, b"x").unwrap();
        assert!(cleanup_audio_temp(&ours));
        assert!(!ours.exists());

        let dir = tempfile::tempdir().unwrap();
        let foreign = dir.path().join(format!("{TEMP_PREFIX}keep.wav"));
        std::fs::write(&foreign, b"x").unwrap();
        assert!(!cleanup_audio_temp(&foreign));
        assert!(foreign.exists());
    }
}
