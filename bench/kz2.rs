use criterion::{black_box, criterion_group, criterion_main, Criterion};

use image::{GrayImage, Luma};
use kz_disparity::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn textured_pair(width: u32, height: u32, shift: u32) -> StereoFrame {
    let mut rng = StdRng::seed_from_u64(0);
    let left = GrayImage::from_fn(width, height, |_, _| Luma([rng.gen()]));
    let right = GrayImage::from_fn(width, height, |x, y| {
        if x >= shift {
            *left.get_pixel(x - shift, y)
        } else {
            Luma([128])
        }
    });

    StereoFrame::Gray { left, right }
}

fn kz2_bench(c: &mut Criterion) {
    let frame = textured_pair(64, 48, 3);

    let mut alg = Kz2::new(
        Params {
            k: 30,
            lambda1: 18,
            lambda2: 6,
            iter_max: 2,
            ..Params::default()
        },
        0,
        8,
    );

    c.bench_function("kz2 random 64x48 d0-8", |b| {
        b.iter(|| alg.compute(black_box(&frame)))
    });
}

fn expansion_move_bench(c: &mut Criterion) {
    let frame = textured_pair(64, 48, 3);

    c.bench_function("kz2 single expansion 64x48", |b| {
        b.iter(|| {
            let mut m: Matcher = Matcher::new(&frame).unwrap();
            m.set_disp_range(0, 8).unwrap();
            m.expansion_move(black_box(3)).unwrap()
        })
    });
}

criterion_group!(benches, kz2_bench, expansion_move_bench);
criterion_main!(benches);
