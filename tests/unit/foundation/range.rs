use super::*;

fn frames(v: &[u64]) -> Vec<FrameIndex> {
    v.iter().copied().map(FrameIndex).collect()
}

#[test]
fn inclusive_span() {
    assert_eq!(parse_frame_sequence("0-4").unwrap(), frames(&[0, 1, 2, 3, 4]));
}

#[test]
fn lists_are_sorted_and_deduplicated() {
    assert_eq!(
        parse_frame_sequence("9, 1;3-4 ,1").unwrap(),
        frames(&[1, 3, 4, 9])
    );
}

#[test]
fn reversed_bounds_are_swapped() {
    assert_eq!(parse_frame_sequence("5-3").unwrap(), frames(&[3, 4, 5]));
}

#[test]
fn wide_punctuation_and_tilde_are_accepted() {
    assert!(parse_frame_sequence("1～2").is_err());
    assert_eq!(parse_frame_sequence("1~2，7；8").unwrap(), frames(&[1, 2, 7, 8]));
    assert_eq!(parse_frame_sequence("4—6").unwrap(), frames(&[4, 5, 6]));
}

#[test]
fn empty_input_is_empty_sequence() {
    assert!(parse_frame_sequence("  ").unwrap().is_empty());
}

#[test]
fn garbage_is_rejected() {
    assert!(parse_frame_sequence("abc").is_err());
    assert!(parse_frame_sequence("-5").is_err());
    assert!(parse_frame_sequence("1-x").is_err());
}

#[test]
fn spans_merge_without_expanding() {
    assert_eq!(
        parse_frame_spans("10-18446744073709551615, 3, 4-5, 0").unwrap(),
        vec![
            (FrameIndex(0), FrameIndex(0)),
            (FrameIndex(3), FrameIndex(5)),
            (FrameIndex(10), FrameIndex(u64::MAX)),
        ]
    );
}

#[test]
fn oversized_sequence_is_rejected() {
    let err = parse_frame_sequence("0-18446744073709551615").unwrap_err();
    assert!(matches!(err, FrameCutError::Validation(_)));
}

#[test]
fn contiguous_list_becomes_half_open_range() {
    let r = parse_frame_range("5-9, 10;12-11").unwrap();
    assert_eq!((r.start, r.end), (FrameIndex(5), FrameIndex(13)));
    let wide = parse_frame_range("0-18446744073709551614").unwrap();
    assert_eq!(wide.end, FrameIndex(u64::MAX));
    assert!(parse_frame_range("1-3, 5").is_err());
    assert!(parse_frame_range("0-18446744073709551615").is_err());
    assert!(parse_frame_range("").is_err());
}
