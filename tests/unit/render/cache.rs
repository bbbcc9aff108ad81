use super::*;

#[test]
fn take_removes_the_entry() {
    let cache = FrameCache::new(["a", "b"]);
    cache
        .insert("a", FrameIndex(3), Picture::transparent(2, 2))
        .unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.take("b", FrameIndex(3)).unwrap().is_none());
    assert!(cache.take("a", FrameIndex(3)).unwrap().is_some());
    assert!(cache.take("a", FrameIndex(3)).unwrap().is_none());
    assert!(cache.is_empty());
}

#[test]
fn unknown_clip_is_an_error() {
    let cache = FrameCache::new(["a"]);
    assert!(cache.insert("z", FrameIndex(0), Picture::transparent(1, 1)).is_err());
    assert!(cache.take("z", FrameIndex(0)).is_err());
}
