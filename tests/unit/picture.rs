use super::*;

#[test]
fn construction_checks_channel_lengths() {
    assert!(Picture::new(2, 2, vec![0; 4], vec![0; 4], vec![0; 3], None).is_err());
    assert!(Picture::new(2, 2, vec![0; 4], vec![0; 4], vec![0; 4], Some(vec![1.0; 3])).is_err());

    let pic = Picture::new(2, 3, vec![0; 6], vec![0; 6], vec![0; 6], Some(vec![1.0; 6])).unwrap();
    assert_eq!(pic.pixels(), 6);
    assert_eq!(pic.pixels(), (pic.width() * pic.height()) as usize);
    assert!(pic.has_alpha_channel());
    assert_eq!(pic.alpha().unwrap().len(), pic.pixels());
}

#[test]
fn construction_rejects_alpha_outside_unit_range() {
    let rgb = || vec![0u16; 2];
    for bad in [f32::NAN, f32::INFINITY, -0.1, 1.5] {
        let err = Picture::new(2, 1, rgb(), rgb(), rgb(), Some(vec![0.5, bad])).unwrap_err();
        assert!(matches!(err, FrameCutError::Validation(_)), "{bad}");
    }
    assert!(Picture::new(2, 1, rgb(), rgb(), rgb(), Some(vec![0.0, 1.0])).is_ok());
    assert_eq!(Picture::solid(1, 1, [0; 3], Some(f32::NAN)).alpha(), Some(&[0.0][..]));
}

#[test]
fn ensure_alpha_defaults_to_opaque() {
    let mut pic = Picture::solid(3, 1, [1, 2, 3], None);
    assert!(!pic.has_alpha_channel());
    assert_eq!(pic.alpha_at(0), 1.0);
    pic.ensure_alpha();
    assert_eq!(pic.alpha().unwrap(), &[1.0, 1.0, 1.0]);
}

#[test]
fn rgba8_widens_by_257() {
    let pic = Picture::from_rgba8(1, 1, &[255, 128, 0, 255]).unwrap();
    assert_eq!(pic.r(), &[65535]);
    assert_eq!(pic.g(), &[128 * 257]);
    assert_eq!(pic.b(), &[0]);
    assert_eq!(pic.to_rgba8(), vec![255, 128, 0, 255]);
}

#[test]
fn flatten_multiplies_alpha_and_clamps() {
    let pic = Picture::new(
        2,
        1,
        vec![60000, 60000],
        vec![1000, 1000],
        vec![0, 0],
        Some(vec![0.5, 1.0]),
    )
    .unwrap();
    let flat = pic.flattened(0);
    assert!(!flat.has_alpha_channel());
    assert_eq!(flat.r(), &[30000, 60000]);
    assert_eq!(flat.g(), &[500, 1000]);

    let bounded = pic.flattened(40000);
    assert_eq!(bounded.r(), &[30000, 40000]);
}

#[test]
fn resize_keeps_uniform_color_and_alpha_presence() {
    let pic = Picture::solid(4, 4, [1000, 2000, 3000], None);
    let out = pic.resized(2, 8).unwrap();
    assert_eq!((out.width(), out.height()), (2, 8));
    assert!(!out.has_alpha_channel());
    assert!(out.r().iter().all(|&v| v == 1000));
    assert!(out.b().iter().all(|&v| v == 3000));
    assert!(pic.resized(0, 2).is_err());
}

#[test]
fn crop_clips_to_bounds() {
    let r: Vec<u16> = (0..16).collect();
    let pic = Picture::new(4, 4, r, vec![0; 16], vec![0; 16], None).unwrap();
    let out = pic.cropped(1, 2, 10, 1).unwrap();
    assert_eq!((out.width(), out.height()), (3, 1));
    assert_eq!(out.r(), &[9, 10, 11]);
    assert!(pic.cropped(4, 0, 1, 1).is_err());
}

#[test]
fn place_drops_out_of_canvas_pixels() {
    let pic = Picture::solid(2, 2, [7, 7, 7], None);
    let out = pic.placed(-1, 1, 3, 3);
    assert_eq!(out.r(), &[0, 0, 0, 7, 0, 0, 7, 0, 0]);
    assert_eq!(out.alpha_at(3), 1.0);
    assert_eq!(out.alpha_at(0), 0.0);
}
