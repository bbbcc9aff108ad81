//! Decode service: source pictures for clips.
//!
//! Sources are opened once up front; an unreadable source fails the whole run before any frame
//! is scheduled.

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::picture::Picture;
use crate::timeline::clip::{Clip, ClipSource};
use crate::timeline::draft::Draft;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stream metadata for an opened clip source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Native frame rate, when the source has one.
    pub fps: Option<Fps>,
    /// Number of decodable frames, when known.
    pub total_frames: Option<u64>,
}

/// Provider of decoded clip pictures.
pub trait DecodeService: Send + Sync {
    /// Metadata of the source behind `clip_id`.
    fn stream_info(&self, clip_id: &str) -> Option<StreamInfo>;

    /// Picture of `clip` at `source_frame`, at the source's native resolution.
    fn get_picture(&self, clip: &Clip, source_frame: u64) -> FrameCutResult<Picture>;
}

/// Decode and resample to the output resolution.
pub fn decode_for_output(
    decoder: &dyn DecodeService,
    clip: &Clip,
    source_frame: u64,
    canvas: Canvas,
) -> FrameCutResult<Picture> {
    decoder
        .get_picture(clip, source_frame)?
        .resized(canvas.width, canvas.height)
}

/// Decoder serving pictures held in memory, keyed by clip id and source frame.
///
/// A still registered with [`MemoryDecoder::insert_still`] answers every frame of its clip.
#[derive(Debug, Default)]
pub struct MemoryDecoder {
    frames: HashMap<(String, u64), Picture>,
    stills: HashMap<String, Picture>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, clip_id: impl Into<String>, source_frame: u64, pic: Picture) {
        self.frames.insert((clip_id.into(), source_frame), pic);
    }

    pub fn insert_still(&mut self, clip_id: impl Into<String>, pic: Picture) {
        self.stills.insert(clip_id.into(), pic);
    }
}

impl DecodeService for MemoryDecoder {
    fn stream_info(&self, clip_id: &str) -> Option<StreamInfo> {
        let (pic, total) = match self.stills.get(clip_id) {
            Some(pic) => (pic, None),
            None => {
                let mut frames = self.frames.iter().filter(|((id, _), _)| id == clip_id);
                let (_, pic) = frames.next()?;
                (pic, Some(frames.count() as u64 + 1))
            }
        };
        Some(StreamInfo {
            width: pic.width(),
            height: pic.height(),
            fps: None,
            total_frames: total,
        })
    }

    fn get_picture(&self, clip: &Clip, source_frame: u64) -> FrameCutResult<Picture> {
        if let Some(pic) = self.frames.get(&(clip.id.clone(), source_frame)) {
            return Ok(pic.clone());
        }
        if let Some(pic) = self.stills.get(&clip.id) {
            return Ok(pic.clone());
        }
        if let ClipSource::Solid { r, g, b, a } = clip.source {
            return Ok(solid_picture(Canvas { width: 1, height: 1 }, r, g, b, a));
        }
        Err(FrameCutError::decode(format!(
            "no picture for clip '{}' frame {source_frame}",
            clip.id
        )))
    }
}

/// Decoder for drafts on disk: synthesizes solid colors, loads photos with `image`, and reads
/// video frames through the system `ffmpeg` (feature `media-ffmpeg`).
#[derive(Debug)]
pub struct MediaDecoder {
    canvas: Canvas,
    sources: HashMap<String, OpenedSource>,
}

#[derive(Debug)]
enum OpenedSource {
    Solid(Arc<Picture>),
    Photo(Arc<Picture>),
    Video(VideoSourceInfo),
}

/// Probed video metadata.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: Option<Fps>,
    pub total_frames: Option<u64>,
}

impl MediaDecoder {
    /// Open every clip source of `draft`, resolving relative paths against `assets_root`.
    #[tracing::instrument(skip(draft), fields(clips = draft.clips.len()))]
    pub fn open(draft: &Draft, assets_root: &Path) -> FrameCutResult<Self> {
        let mut sources = HashMap::new();
        for clip in &draft.clips {
            let opened = match &clip.source {
                ClipSource::Solid { r, g, b, a } => {
                    OpenedSource::Solid(Arc::new(solid_picture(draft.canvas, *r, *g, *b, *a)))
                }
                ClipSource::Photo { path } => {
                    let path = assets_root.join(path);
                    OpenedSource::Photo(Arc::new(load_photo(&path)?))
                }
                ClipSource::Video { path } => {
                    OpenedSource::Video(probe_video(&assets_root.join(path))?)
                }
            };
            tracing::debug!(clip = %clip.id, "opened clip source");
            sources.insert(clip.id.clone(), opened);
        }
        Ok(Self {
            canvas: draft.canvas,
            sources,
        })
    }

    fn source(&self, clip_id: &str) -> FrameCutResult<&OpenedSource> {
        self.sources
            .get(clip_id)
            .ok_or_else(|| FrameCutError::decode(format!("clip '{clip_id}' was not opened")))
    }
}

impl DecodeService for MediaDecoder {
    fn stream_info(&self, clip_id: &str) -> Option<StreamInfo> {
        let info = match self.sources.get(clip_id)? {
            OpenedSource::Solid(_) => StreamInfo {
                width: self.canvas.width,
                height: self.canvas.height,
                fps: None,
                total_frames: None,
            },
            OpenedSource::Photo(pic) => StreamInfo {
                width: pic.width(),
                height: pic.height(),
                fps: None,
                total_frames: None,
            },
            OpenedSource::Video(v) => StreamInfo {
                width: v.width,
                height: v.height,
                fps: v.fps,
                total_frames: v.total_frames,
            },
        };
        Some(info)
    }

    fn get_picture(&self, clip: &Clip, source_frame: u64) -> FrameCutResult<Picture> {
        match self.source(&clip.id)? {
            OpenedSource::Solid(pic) | OpenedSource::Photo(pic) => Ok(Picture::clone(pic)),
            OpenedSource::Video(v) => {
                let frame = match v.total_frames {
                    Some(total) if total > 0 && source_frame >= total => {
                        tracing::debug!(clip = %clip.id, source_frame, total, "clamping to last source frame");
                        total - 1
                    }
                    _ => source_frame,
                };
                let fps = v.fps.unwrap_or(Fps { num: 30, den: 1 });
                decode_video_frame(v, fps.frame_to_secs(frame))
            }
        }
    }
}

fn solid_picture(canvas: Canvas, r: u8, g: u8, b: u8, a: Option<u8>) -> Picture {
    Picture::solid(
        canvas.width,
        canvas.height,
        [u16::from(r) * 257, u16::from(g) * 257, u16::from(b) * 257],
        a.map(|a| f32::from(a) / 255.0),
    )
}

fn load_photo(path: &Path) -> FrameCutResult<Picture> {
    let img = image::open(path).map_err(|e| {
        FrameCutError::decode(format!("failed to decode image '{}': {e}", path.display()))
    })?;
    let rgba = img.to_rgba16();
    let (width, height) = rgba.dimensions();
    Picture::from_rgba16(width, height, rgba.as_raw())
}

/// Probe source video metadata through `ffprobe`.
#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(source_path: &Path) -> FrameCutResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        avg_frame_rate: Option<String>,
        nb_frames: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
    }

    let out = std::process::Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(source_path)
        .output()
        .map_err(|e| FrameCutError::decode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(FrameCutError::decode(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| FrameCutError::decode(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            FrameCutError::decode(format!("no video stream in '{}'", source_path.display()))
        })?;
    let width = video
        .width
        .ok_or_else(|| FrameCutError::decode("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| FrameCutError::decode("missing video height from ffprobe"))?;
    let fps = video.avg_frame_rate.as_deref().and_then(|r| {
        let (num, den) = r.split_once('/')?;
        Fps::new(num.parse().ok()?, den.parse().ok()?).ok()
    });
    let total_frames = video.nb_frames.as_deref().and_then(|n| n.parse().ok());

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps,
        total_frames,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
/// Probe source video metadata through `ffprobe`.
///
/// Returns an error when `media-ffmpeg` feature is disabled.
pub fn probe_video(source_path: &Path) -> FrameCutResult<VideoSourceInfo> {
    Err(FrameCutError::decode(format!(
        "video clip '{}' requires the 'media-ffmpeg' feature",
        source_path.display()
    )))
}

#[cfg(feature = "media-ffmpeg")]
fn decode_video_frame(source: &VideoSourceInfo, time_sec: f64) -> FrameCutResult<Picture> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{time_sec:.9}")])
        .arg("-i")
        .arg(&source.source_path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba64le",
            "pipe:1",
        ])
        .output()
        .map_err(|e| FrameCutError::decode(format!("failed to run ffmpeg for video decode: {e}")))?;
    if !out.status.success() {
        return Err(FrameCutError::decode(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected = source.width as usize * source.height as usize * 8;
    if expected == 0 || out.stdout.len() < expected {
        return Err(FrameCutError::decode(format!(
            "decoded frame of '{}' has {} bytes, expected {expected}",
            source.source_path.display(),
            out.stdout.len()
        )));
    }
    let samples: Vec<u16> = out.stdout[..expected]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Picture::from_rgba16(source.width, source.height, &samples)
}

#[cfg(not(feature = "media-ffmpeg"))]
fn decode_video_frame(source: &VideoSourceInfo, _time_sec: f64) -> FrameCutResult<Picture> {
    Err(FrameCutError::decode(format!(
        "video clip '{}' requires the 'media-ffmpeg' feature",
        source.source_path.display()
    )))
}

#[cfg(test)]
#[path = "../tests/unit/decode.rs"]
mod tests;
