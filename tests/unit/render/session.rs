use super::*;
use crate::compose::mixture::MixtureMode;
use crate::decode::MemoryDecoder;
use crate::encode::sink::InMemorySink;
use crate::timeline::clip::{Clip, ClipSource};

fn solid_clip(id: &str, layer: u32, start: u64, duration: u64, mixture: MixtureMode) -> Clip {
    Clip {
        id: id.to_owned(),
        name: String::new(),
        layer,
        start_frame: start,
        relative_start_frame: 0,
        duration,
        speed_ratio: 1.0,
        mixture,
        effects: Vec::new(),
        source: ClipSource::Solid {
            r: 0,
            g: 0,
            b: 0,
            a: None,
        },
    }
}

fn draft(clips: Vec<Clip>, duration: u64) -> Draft {
    Draft {
        name: "t".to_owned(),
        canvas: Canvas {
            width: 2,
            height: 2,
        },
        fps: Fps { num: 30, den: 1 },
        duration,
        clips,
    }
}

fn session(draft: &Draft, decoder: MemoryDecoder, threads: usize) -> RenderSession {
    let opts = RenderOpts {
        max_threads: threads,
        ..RenderOpts::default()
    };
    RenderSession::new(draft, Arc::new(decoder), ComputeDispatcher::cpu(), opts).unwrap()
}

#[test]
fn default_opts_scale_with_cores() {
    let opts = RenderOpts::default();
    assert!(opts.max_threads >= 1);
    assert_eq!(opts.error_policy, ErrorPolicy::Deferred);
    assert_eq!(opts.poll_interval, Duration::from_millis(2));
}

#[test]
fn zero_workers_is_rejected() {
    let d = draft(Vec::new(), 3);
    let opts = RenderOpts {
        max_threads: 0,
        ..RenderOpts::default()
    };
    assert!(
        RenderSession::new(&d, Arc::new(MemoryDecoder::new()), ComputeDispatcher::cpu(), opts)
            .is_err()
    );
}

#[test]
fn render_frame_stacks_layers_top_first() {
    let d = draft(
        vec![
            solid_clip("base", 0, 0, 4, MixtureMode::Add),
            solid_clip("top", 1, 0, 4, MixtureMode::Overlay),
        ],
        4,
    );
    let mut dec = MemoryDecoder::new();
    dec.insert_still("base", Picture::solid(2, 2, [100, 200, 300], Some(1.0)));
    dec.insert_still("top", Picture::solid(2, 2, [1, 2, 3], Some(0.5)));
    let s = session(&d, dec, 2);

    let pic = s.render_frame(FrameIndex(1)).unwrap();
    assert_eq!(pic.r()[0], 101);
    assert_eq!(pic.g()[3], 202);
    assert_eq!(pic.b()[2], 303);
    assert_eq!(pic.alpha_at(0), 0.5);
}

#[test]
fn render_frame_without_clips_is_transparent() {
    let d = draft(vec![solid_clip("a", 0, 0, 2, MixtureMode::Overlay)], 5);
    let s = session(&d, MemoryDecoder::new(), 1);
    let pic = s.render_frame(FrameIndex(4)).unwrap();
    assert_eq!(pic.canvas(), s.canvas());
    assert!(pic.alpha().unwrap().iter().all(|a| *a == 0.0));
    assert!(s.render_frame(FrameIndex(5)).is_err());
}

#[test]
fn range_past_duration_is_rejected() {
    let d = draft(Vec::new(), 3);
    let s = session(&d, MemoryDecoder::new(), 1);
    let mut out = InMemorySink::new();
    let err = s
        .render_range(FrameRange::full(4), &mut out, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, FrameCutError::Validation(_)));
    assert!(out.config().is_none());
}

#[test]
fn blank_only_range_is_written_in_full() {
    let d = draft(Vec::new(), 6);
    let s = session(&d, MemoryDecoder::new(), 3);
    let mut out = InMemorySink::new();
    let stats = s
        .render_range(s.range(), &mut out, &CancellationToken::new())
        .unwrap();
    assert_eq!(stats.frames_total, 6);
    assert_eq!(stats.frames_blank, 6);
    assert_eq!(stats.frames_rendered, 0);
    assert_eq!(out.frames().len(), 6);
    assert!(out.is_ended());
}

#[test]
fn single_worker_interleaves_blanks() {
    let d = draft(
        vec![
            solid_clip("a", 0, 1, 2, MixtureMode::Overlay),
            solid_clip("b", 0, 5, 1, MixtureMode::Overlay),
        ],
        8,
    );
    let mut dec = MemoryDecoder::new();
    dec.insert_still("a", Picture::solid(2, 2, [7, 7, 7], None));
    dec.insert_still("b", Picture::solid(2, 2, [9, 9, 9], None));
    let s = session(&d, dec, 1);
    let mut out = InMemorySink::new();
    let stats = s
        .render_range(s.range(), &mut out, &CancellationToken::new())
        .unwrap();

    let idx: Vec<u64> = out.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(idx, (0..8).collect::<Vec<_>>());
    let reds: Vec<u16> = out.frames().iter().map(|(_, p)| p.r()[0]).collect();
    assert_eq!(reds, [0, 7, 7, 0, 0, 9, 0, 0]);
    assert_eq!(stats.frames_rendered, 3);
    assert_eq!(stats.frames_blank, 5);
    assert_eq!(stats.frames_regenerated, 0);
}
