use super::*;
use crate::compose::mixture::MixtureMode;

fn draft_with(source: ClipSource) -> Draft {
    Draft {
        name: String::new(),
        canvas: Canvas {
            width: 8,
            height: 4,
        },
        fps: Fps { num: 25, den: 1 },
        duration: 5,
        clips: vec![Clip {
            id: "c0".to_owned(),
            name: String::new(),
            layer: 0,
            start_frame: 0,
            relative_start_frame: 0,
            duration: 5,
            speed_ratio: 1.0,
            mixture: MixtureMode::Overlay,
            effects: Vec::new(),
            source,
        }],
    }
}

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("framecut_decode_{tag}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn solid_sources_fill_the_canvas() {
    let draft = draft_with(ClipSource::Solid {
        r: 255,
        g: 0,
        b: 1,
        a: Some(51),
    });
    let dec = MediaDecoder::open(&draft, Path::new(".")).unwrap();
    let pic = dec.get_picture(&draft.clips[0], 3).unwrap();
    assert_eq!((pic.width(), pic.height()), (8, 4));
    assert!(pic.r().iter().all(|&v| v == 65535));
    assert!(pic.b().iter().all(|&v| v == 257));
    assert!((pic.alpha_at(0) - 0.2).abs() < 1e-6);
    assert_eq!(dec.stream_info("c0").unwrap().width, 8);
}

#[test]
fn photos_are_loaded_once_and_served_for_any_frame() {
    let dir = temp_dir("photo");
    let data: Vec<u8> = [10u8, 20, 30, 255].repeat(6);
    image::save_buffer_with_format(
        dir.join("p.png"),
        &data,
        3,
        2,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .unwrap();

    let draft = draft_with(ClipSource::Photo {
        path: PathBuf::from("p.png"),
    });
    let dec = MediaDecoder::open(&draft, &dir).unwrap();
    let a = dec.get_picture(&draft.clips[0], 0).unwrap();
    let b = dec.get_picture(&draft.clips[0], 4).unwrap();
    assert_eq!(a, b);
    assert_eq!((a.width(), a.height()), (3, 2));
    assert_eq!(a.g()[0], 20 * 257);

    let out = decode_for_output(&dec, &draft.clips[0], 0, draft.canvas).unwrap();
    assert_eq!(out.canvas(), draft.canvas);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn unreadable_photo_fails_at_open() {
    let draft = draft_with(ClipSource::Photo {
        path: PathBuf::from("definitely-missing.png"),
    });
    let err = MediaDecoder::open(&draft, &temp_dir("missing")).unwrap_err();
    assert!(matches!(err, FrameCutError::Decode(_)));
}

#[cfg(not(feature = "media-ffmpeg"))]
#[test]
fn video_requires_media_feature() {
    let draft = draft_with(ClipSource::Video {
        path: PathBuf::from("clip.mp4"),
    });
    let err = MediaDecoder::open(&draft, Path::new(".")).unwrap_err();
    assert!(err.to_string().contains("media-ffmpeg"));
}

#[test]
fn memory_decoder_prefers_exact_frames() {
    let draft = draft_with(ClipSource::Photo {
        path: PathBuf::from("unused.png"),
    });
    let clip = &draft.clips[0];
    let mut dec = MemoryDecoder::new();
    dec.insert("c0", 2, Picture::solid(1, 1, [2, 2, 2], None));
    dec.insert("c0", 3, Picture::solid(1, 1, [3, 3, 3], None));

    assert_eq!(dec.get_picture(clip, 3).unwrap().r(), &[3]);
    assert!(matches!(
        dec.get_picture(clip, 9),
        Err(FrameCutError::Decode(_))
    ));
    assert_eq!(dec.stream_info("c0").unwrap().total_frames, Some(2));

    dec.insert_still("c0", Picture::solid(1, 1, [7, 7, 7], None));
    assert_eq!(dec.get_picture(clip, 9).unwrap().r(), &[7]);
}
