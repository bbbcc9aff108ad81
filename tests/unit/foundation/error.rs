use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        FrameCutError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(FrameCutError::decode("x").to_string().contains("decode error:"));
    assert!(FrameCutError::encode("x").to_string().contains("encode error:"));
}

#[test]
fn overlap_names_both_clips() {
    let err = FrameCutError::Overlap {
        frame: 100,
        layer: 0,
        first: "intro".to_owned(),
        second: "title".to_owned(),
    };
    let msg = err.to_string();
    assert!(msg.contains("intro"));
    assert!(msg.contains("title"));
    assert!(msg.contains("100"));
}

#[test]
fn aggregate_counts_failures() {
    let err = FrameCutError::Aggregate {
        total: 10,
        errors: vec![
            FrameCutError::render(3, FrameCutError::decode("bad")),
            FrameCutError::render(4, FrameCutError::compute_unavailable("overlay")),
        ],
    };
    assert_eq!(err.to_string(), "2 of 10 frames failed to render");
}

#[test]
fn fatal_kinds_survive_wrapping() {
    assert!(FrameCutError::DuplicateFrameWrite { frame: 1 }.is_fatal());
    assert!(FrameCutError::render(1, FrameCutError::Cancelled).is_fatal());
    assert!(!FrameCutError::render(1, FrameCutError::decode("x")).is_fatal());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = FrameCutError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
