use proptest::prelude::*;

use verticut::{Frame, TargetGeometry, VerticutError, composite_frame};

fn small_geometry() -> TargetGeometry {
    TargetGeometry {
        width: 18,
        blur_kernel: 3,
        ..TargetGeometry::default()
    }
}

fn gradient(w: u32, h: u32, seed: u8) -> Frame {
    let mut data = Vec::with_capacity((w * h * 3) as usize);
    for y in 0..h {
        for x in 0..w {
            data.push((x as u8).wrapping_add(seed));
            data.push((y as u8).wrapping_mul(3));
            data.push(seed ^ (x as u8));
        }
    }
    Frame::new(w, h, data).unwrap()
}

#[test]
fn reference_layout_for_full_hd_landscape() {
    let g = TargetGeometry::default();
    let layout = g.layout(1920, 1080).unwrap();
    assert_eq!((layout.canvas.width, layout.canvas.height), (1080, 1920));
    assert_eq!(layout.background.scaled.width, 3413);
    assert_eq!(layout.background.crop_x, 1166);
    assert_eq!(layout.foreground.scaled.width, 2048);
    assert_eq!(layout.foreground.scaled.height, 1152);
    assert_eq!(layout.foreground.crop_x, 484);
    assert_eq!(layout.top_margin(), 384);
    assert_eq!(layout.bottom_margin(), 384);
}

#[test]
fn portrait_source_is_pillarboxed_not_rejected() {
    let g = TargetGeometry {
        width: 36,
        blur_kernel: 5,
        ..TargetGeometry::default()
    };
    // Already 9:16: background fits exactly, the band is narrower than the canvas.
    let src = gradient(36, 64, 7);
    let out = composite_frame(&src, &g).unwrap();
    assert_eq!((out.width, out.height), (36, 64));

    let layout = g.layout(36, 64).unwrap();
    assert!(layout.foreground.visible.width < 36);
    assert!(layout.foreground.dest_x > 0);
}

#[test]
fn source_narrower_than_target_fails() {
    let err = composite_frame(&gradient(8, 64, 0), &small_geometry()).unwrap_err();
    assert!(matches!(err, VerticutError::FrameGeometry(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn output_always_has_canvas_size(w in 36u32..160, h_pct in 30u32..100, seed in any::<u8>()) {
        let h = (w * h_pct / 100).max(2);
        let g = small_geometry();
        let out = composite_frame(&gradient(w, h, seed), &g).unwrap();
        prop_assert_eq!((out.width, out.height), (18, 32));
        prop_assert_eq!(out.data.len(), 18 * 32 * 3);
    }

    #[test]
    fn compositing_is_deterministic(w in 36u32..120, seed in any::<u8>()) {
        let g = small_geometry();
        let src = gradient(w, w * 9 / 16, seed);
        let a = composite_frame(&src, &g).unwrap();
        let b = composite_frame(&src, &g).unwrap();
        prop_assert_eq!(a, b);
    }
}
