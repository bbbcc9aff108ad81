use super::*;

const CLAMP: BlendParams = BlendParams {
    upper_bound: 0,
    allow_overflow: false,
};
const WRAP: BlendParams = BlendParams {
    upper_bound: 0,
    allow_overflow: true,
};

#[test]
fn add_saturates_or_wraps() {
    assert_eq!(add_u16(40000, 40000, CLAMP), 65535);
    assert_eq!(add_u16(40000, 40000, WRAP), 14465);
    assert_eq!(add_u16(100, 200, CLAMP), 300);
}

#[test]
fn add_respects_upper_bound() {
    let p = BlendParams {
        upper_bound: 250,
        allow_overflow: false,
    };
    assert_eq!(add_u16(100, 200, p), 250);
    assert_eq!(add_u16(100, 100, p), 200);
}

#[test]
fn subtract_clamps_negative_to_zero() {
    assert_eq!(subtract_u16(100, 300, CLAMP), 0);
    assert_eq!(subtract_u16(100, 300, WRAP), 0);
    assert_eq!(subtract_u16(300, 100, CLAMP), 200);
}

#[test]
fn multiply_saturates_or_keeps_low_bits() {
    assert_eq!(multiply_u16(200, 300, CLAMP), 60000);
    assert_eq!(multiply_u16(300, 300, CLAMP), 65535);
    assert_eq!(multiply_u16(300, 300, WRAP), (90000u32 & 0xFFFF) as u16);
}

#[test]
fn overlay_thresholds() {
    assert_eq!(overlay_px(10, 1.0, 20, 0.3), (10, 1.0));
    assert_eq!(overlay_px(10, 0.05, 20, 0.3), (20, 0.3));
    assert_eq!(overlay_px(10, 0.0, 20, 0.0), (20, 0.0));

    let (c, a) = overlay_px(1000, 0.5, 3000, 1.0);
    assert_eq!(c, 2000);
    assert!((a - 1.0).abs() < 1e-6);
}

fn gradient(width: u32, height: u32, alpha: Option<f32>) -> Picture {
    let n = (width * height) as usize;
    let r: Vec<u16> = (0..n).map(|i| (i * 1000) as u16).collect();
    let g: Vec<u16> = (0..n).map(|i| (i * 7 + 3) as u16).collect();
    let b: Vec<u16> = (0..n).map(|i| 65535 - i as u16).collect();
    Picture::new(width, height, r, g, b, alpha.map(|a| vec![a; n])).unwrap()
}

#[test]
fn overlay_with_transparent_foreground_is_background() {
    let compute = ComputeDispatcher::cpu();
    let engine = MixtureEngine::new(&compute, CLAMP);
    let bg = gradient(4, 3, Some(0.75));
    let fg = Picture::solid(4, 3, [65535, 0, 65535], Some(0.0));

    let out = engine.mix(MixtureMode::Overlay, fg, bg.clone()).unwrap();
    assert_eq!(out, bg);
}

#[test]
fn overlay_without_foreground_alpha_returns_foreground() {
    let compute = ComputeDispatcher::cpu();
    let engine = MixtureEngine::new(&compute, CLAMP);
    let fg = gradient(2, 2, None);
    let out = engine
        .mix(MixtureMode::Overlay, fg.clone(), Picture::solid(2, 2, [9, 9, 9], Some(1.0)))
        .unwrap();
    assert_eq!(out, fg);
}

#[test]
fn arithmetic_modes_keep_top_alpha() {
    let compute = ComputeDispatcher::cpu();
    let engine = MixtureEngine::new(&compute, CLAMP);
    let top = Picture::solid(2, 1, [40000, 10, 5], Some(0.4));
    let base = Picture::solid(2, 1, [40000, 20, 9], None);

    let out = engine.mix(MixtureMode::Add, top.clone(), base.clone()).unwrap();
    assert_eq!(out.r(), &[65535, 65535]);
    assert_eq!(out.g(), &[30, 30]);
    assert_eq!(out.alpha(), Some(&[0.4f32, 0.4][..]));

    let out = engine.mix(MixtureMode::Subtract, top, base).unwrap();
    assert_eq!(out.g(), &[0, 0]);
    assert_eq!(out.b(), &[0, 0]);
}

#[test]
fn size_mismatch_is_rejected() {
    let compute = ComputeDispatcher::cpu();
    let engine = MixtureEngine::new(&compute, CLAMP);
    let err = engine
        .mix(
            MixtureMode::Add,
            Picture::solid(2, 2, [0, 0, 0], None),
            Picture::solid(2, 1, [0, 0, 0], None),
        )
        .unwrap_err();
    assert!(matches!(err, FrameCutError::Validation(_)));
}

#[test]
fn compose_folds_top_down() {
    let compute = ComputeDispatcher::cpu();
    let engine = MixtureEngine::new(&compute, CLAMP);

    // Half-transparent red over opaque blue, added onto a small grey.
    let top = Picture::solid(1, 1, [65535, 0, 0], Some(0.5));
    let mid = Picture::solid(1, 1, [0, 0, 65535], Some(1.0));
    let bottom = Picture::solid(1, 1, [100, 100, 100], None);

    let out = engine
        .compose([
            (top, MixtureMode::Overlay),
            (mid, MixtureMode::Overlay),
            (bottom, MixtureMode::Add),
        ])
        .unwrap();

    // Overlay yields (32767, 0, 32767) at full alpha, then Add lifts every channel by 100.
    assert_eq!(out.r(), &[32867]);
    assert_eq!(out.g(), &[100]);
    assert_eq!(out.b(), &[32867]);
    assert_eq!(out.alpha(), Some(&[1.0f32][..]));
}

#[test]
fn compose_needs_a_layer() {
    let compute = ComputeDispatcher::cpu();
    let engine = MixtureEngine::new(&compute, CLAMP);
    assert!(engine.compose(Vec::new()).is_err());
}

#[test]
fn mixture_names_parse() {
    let m: MixtureMode = serde_json::from_str("\"minus\"").unwrap();
    assert_eq!(m, MixtureMode::Subtract);
    assert!(serde_json::from_str::<MixtureMode>("\"screen\"").is_err());
}
