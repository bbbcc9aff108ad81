use super::*;

const CANVAS: Canvas = Canvas {
    width: 4,
    height: 2,
};

#[test]
fn window_is_clamped_per_channel() {
    let (low, high) = remove_color_window([255, 0, 255, 0], 10);
    assert_eq!(low, [0, 65525, 0]);
    assert_eq!(high, [10, 65535, 10]);
}

#[test]
fn remove_color_clears_pure_green_and_keeps_black() {
    let compute = ComputeDispatcher::cpu();
    let pic = Picture::new(
        2,
        1,
        vec![0, 0],
        vec![65535, 0],
        vec![0, 0],
        None,
    )
    .unwrap();

    let effect = Effect::RemoveColor {
        color: [255, 0, 255, 0],
        range: 10,
    };
    let out = effect
        .render(pic, &compute, Canvas { width: 2, height: 1 })
        .unwrap();

    assert_eq!(out.alpha(), Some(&[0.0f32, 1.0][..]));
    assert_eq!(out.r(), &[0, 0]);
    assert_eq!(out.g(), &[0, 0]);
    assert_eq!(out.b(), &[0, 0]);
}

#[test]
fn remove_color_needs_all_channels_inside() {
    let (low, high) = remove_color_window([255, 0, 255, 0], 10);
    assert_eq!(
        remove_color_px([20, 65535, 0], 0.8, low, high),
        ([20, 65535, 0], 0.8)
    );
    assert_eq!(remove_color_px([10, 65525, 10], 0.8, low, high), ([0; 3], 0.0));
}

#[test]
fn remove_color_reports_missing_backend_op() {
    let compute = ComputeDispatcher::new(std::sync::Arc::new(
        crate::compute::CpuBackend::new().without(ComputeOp::RemoveColor),
    ));
    let effect = Effect::RemoveColor {
        color: [255, 1, 2, 3],
        range: 0,
    };
    let err = effect
        .render(Picture::solid(1, 1, [0, 0, 0], None), &compute, CANVAS)
        .unwrap_err();
    assert!(matches!(err, FrameCutError::ComputeUnavailable { .. }));
}

#[test]
fn chain_runs_in_order_then_fits_canvas() {
    let compute = ComputeDispatcher::cpu();
    let r: Vec<u16> = (0..8).collect();
    let pic = Picture::new(4, 2, r, vec![0; 8], vec![0; 8], None).unwrap();

    let effects = [
        Effect::Crop {
            x: 1,
            y: 0,
            width: 2,
            height: 1,
        },
        Effect::Place { x: 1, y: 1 },
    ];
    let out = apply_effects(pic, &effects, &compute, CANVAS).unwrap();
    assert_eq!(out.canvas(), CANVAS);
    assert_eq!(out.r(), &[0, 0, 0, 0, 0, 1, 2, 0]);
    assert_eq!(out.alpha_at(0), 0.0);
    assert_eq!(out.alpha_at(5), 1.0);
}

#[test]
fn small_results_are_placed_and_large_ones_resized() {
    let compute = ComputeDispatcher::cpu();
    let small = Picture::solid(2, 1, [5, 5, 5], None);
    let out = apply_effects(small, &[], &compute, CANVAS).unwrap();
    assert_eq!(out.r(), &[5, 5, 0, 0, 0, 0, 0, 0]);

    let large = Picture::solid(8, 4, [5, 5, 5], None);
    let out = apply_effects(large, &[], &compute, CANVAS).unwrap();
    assert_eq!(out.canvas(), CANVAS);
    assert!(out.r().iter().all(|&v| v == 5));
}

#[test]
fn unknown_effect_type_is_rejected() {
    let ok: Effect = serde_json::from_str(r#"{"type":"resize","width":4,"height":4}"#).unwrap();
    assert_eq!(ok, Effect::Resize { width: 4, height: 4 });
    assert!(serde_json::from_str::<Effect>(r#"{"type":"blur","radius":3}"#).is_err());
    assert!(
        serde_json::from_str::<Effect>(r#"{"type":"resize","width":4,"height":4,"x":1}"#)
            .is_err()
    );
}
