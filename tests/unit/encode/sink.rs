use super::*;

fn cfg(width: u32, height: u32) -> SinkConfig {
    SinkConfig {
        width,
        height,
        fps: Fps { num: 24, den: 1 },
    }
}

fn out_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("framecut_seq_{tag}_{}", std::process::id()))
}

#[test]
fn in_memory_sink_records_frames() {
    let mut sink = InMemorySink::new();
    sink.begin(cfg(1, 1)).unwrap();
    sink.push_frame(FrameIndex(0), &Picture::solid(1, 1, [1, 2, 3], None))
        .unwrap();
    sink.end().unwrap();
    assert!(sink.is_ended());
    assert_eq!(sink.config(), Some(cfg(1, 1)));
    assert_eq!(sink.frames().len(), 1);
}

#[test]
fn png16_alpha_round_trips_through_disk() {
    let dir = out_dir("png16a");
    let mut sink = ImageSequenceSink::new(&dir, ImageSequenceFormat::Png16Alpha);
    sink.begin(cfg(2, 1)).unwrap();
    let pic = Picture::new(
        2,
        1,
        vec![1000, 65535],
        vec![2000, 0],
        vec![3000, 0],
        Some(vec![1.0, 0.0]),
    )
    .unwrap();
    sink.push_frame(FrameIndex(7), &pic).unwrap();
    sink.end().unwrap();

    let path = dir.join("frame_000007.png");
    let img = image::open(&path).unwrap().to_rgba16();
    assert_eq!(img.get_pixel(0, 0).0, [1000, 2000, 3000, 65535]);
    assert_eq!(img.get_pixel(1, 0).0[3], 0);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn png8_flattens_alpha() {
    let dir = out_dir("png8");
    let mut sink = ImageSequenceSink::new(&dir, ImageSequenceFormat::Png8);
    sink.begin(cfg(1, 1)).unwrap();
    let pic = Picture::solid(1, 1, [65535, 65535, 65535], Some(0.0));
    sink.push_frame(FrameIndex(0), &pic).unwrap();

    let img = image::open(sink.frame_path(FrameIndex(0))).unwrap();
    assert_eq!(img.color(), image::ColorType::Rgb8);
    assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [0, 0, 0]);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn image_sequence_rejects_out_of_order_and_wrong_size() {
    let dir = out_dir("order");
    let mut sink = ImageSequenceSink::new(&dir, ImageSequenceFormat::Png8Alpha);
    sink.begin(cfg(1, 1)).unwrap();
    let pic = Picture::solid(1, 1, [0, 0, 0], None);
    sink.push_frame(FrameIndex(3), &pic).unwrap();
    assert!(sink.push_frame(FrameIndex(3), &pic).is_err());
    assert!(
        sink.push_frame(FrameIndex(4), &Picture::solid(2, 1, [0, 0, 0], None))
            .is_err()
    );
    let _ = std::fs::remove_dir_all(dir);
}
