use image::{Rgba, RgbaImage};
use proptest::prelude::*;

use frame_compare_report::differ::diff;
use frame_compare_report::{Classification, ComparisonOutcome, Threshold, classify};

fn image_from(width: u32, height: u32, pixels: &[[u8; 4]]) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| Rgba(pixels[(y * width + x) as usize]))
}

fn sized_image() -> impl Strategy<Value = (u32, u32, Vec<[u8; 4]>)> {
    (1u32..6, 1u32..6).prop_flat_map(|(w, h)| {
        (
            Just(w),
            Just(h),
            prop::collection::vec(any::<[u8; 4]>(), (w * h) as usize),
        )
    })
}

proptest! {
    #[test]
    fn identical_images_always_match((w, h, pixels) in sized_image(), t in 0.0f64..=1.0) {
        let img = image_from(w, h, &pixels);
        let d = diff(&img, &img).unwrap();
        prop_assert_eq!(d.score, 0.0);
        prop_assert_eq!(d.stats.different_pixels, 0);
        let threshold = Threshold::new(t).unwrap();
        prop_assert_eq!(
            classify(ComparisonOutcome::Scored(d.score), threshold, &[]),
            Classification::Match
        );
    }

    #[test]
    fn score_grows_with_differing_region(
        (w, h, base) in sized_image(),
        replacement in prop::collection::vec(any::<[u8; 4]>(), 25),
        order_seed in any::<u64>(),
    ) {
        let reference = image_from(w, h, &base);
        let n = (w * h) as usize;

        // Deterministic permutation of pixel indices from the seed.
        let mut order: Vec<usize> = (0..n).collect();
        let mut state = order_seed | 1;
        for i in (1..n).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            order.swap(i, (state % (i as u64 + 1)) as usize);
        }

        let mut previous = 0.0f64;
        for k in 0..=n {
            let mut pixels = base.clone();
            for &idx in &order[..k] {
                pixels[idx] = replacement[idx];
            }
            let score = diff(&image_from(w, h, &pixels), &reference).unwrap().score;
            prop_assert!((0.0..=1.0).contains(&score));
            prop_assert!(score >= previous, "region of {k} pixels scored {score} < {previous}");
            previous = score;
        }
    }
}
