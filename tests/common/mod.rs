//! Synthetic stereo pairs shared by the integration tests.

#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Horizontal intensity ramp, constant along columns, saturating at 255.
pub fn ramp(width: u32, height: u32, step: u8) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| Luma([(x * step as u32).min(255) as u8]))
}

/// Same image moved `shift` pixels to the right, uncovered columns set to `fill`.
pub fn shifted(img: &GrayImage, shift: u32, fill: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if x >= shift {
            *img.get_pixel(x - shift, y)
        } else {
            Luma([fill])
        }
    })
}

/// Uniform random texture.
pub fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([rng.gen()]))
}

/// Gray image replicated into the three channels.
pub fn to_rgb(img: &GrayImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}
