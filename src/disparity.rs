//! # General disparity objects
//!
//! This module provides generic disparity traits and structures for use by different algorithms.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use exr::prelude::{SpecificChannels, Vec2, WritableImage};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::definitions::Image;
use std::path::Path;

use crate::error::*;
use crate::frame::StereoFrame;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Color of occluded pixels in the scaled visualisation.
pub const OCCLUDED_COLOR: Rgb<u8> = Rgb([0, 255, 255]);

/// Gray level of the smallest disparity in the scaled visualisation.
const SCALED_FLOOR: i32 = 64;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A generic floating point disparity map. Occluded pixels hold NaN.
pub struct DisparityMap {
    data: Image<Luma<f32>>,
    pub max_disp: Option<f32>,
    pub min_disp: Option<f32>,
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given stereo frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityMap {
    pub fn new(width: usize, height: usize) -> Self {
        DisparityMap {
            data: Image::new(width as u32, height as u32),
            min_disp: None,
            max_disp: None,
        }
    }

    pub fn width(&self) -> usize {
        self.data.width() as usize
    }

    pub fn height(&self) -> usize {
        self.data.height() as usize
    }

    pub fn put(&mut self, x: usize, y: usize, val: f32) {
        self.data.put_pixel(x as u32, y as u32, Luma([val]))
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data.get_pixel(x as u32, y as u32)[0]
    }

    pub fn is_occluded(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_nan()
    }

    /// Converts the image into a dynamic Luma8 image. Occluded pixels are black.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.data.width(), self.data.height(), |x, y| {
            let val = self.data.get_pixel(x, y)[0];
            Luma([clamp_u8(val)])
        })
    }

    /// Converts the image to a normalised GrayImage.
    ///
    /// Maps `[min_disp, max_disp]` onto `[0, 255]`. If either bound is not set then the function
    /// is equivalent to `.to_luma()`.
    pub fn to_luma_normalised(&self) -> GrayImage {
        let (lo, hi) = match (self.min_disp, self.max_disp) {
            (Some(lo), Some(hi)) if hi > lo => (lo, hi),
            _ => return self.to_luma(),
        };
        let mult = 255.0 / (hi - lo);

        GrayImage::from_fn(self.data.width(), self.data.height(), |x, y| {
            let val = self.data.get_pixel(x, y)[0];
            Luma([clamp_u8((val - lo) * mult)])
        })
    }

    /// Converts the map to a viewable RGB image.
    ///
    /// Disparities are drawn as a gray ramp from 64 at `min_disp` to 255 at `max_disp`, leaving
    /// darker levels free. Occluded pixels are cyan if `occluded_distinct` is set and black
    /// otherwise.
    pub fn to_scaled(&self, occluded_distinct: bool) -> RgbImage {
        let lo = self.min_disp.unwrap_or(0.0);
        let hi = self.max_disp.unwrap_or(lo);

        RgbImage::from_fn(self.data.width(), self.data.height(), |x, y| {
            let val = self.data.get_pixel(x, y)[0];

            if val.is_nan() {
                return if occluded_distinct {
                    OCCLUDED_COLOR
                } else {
                    Rgb([0, 0, 0])
                };
            }

            let c = if hi > lo {
                let t = ((val - lo) / (hi - lo)).max(0.0).min(1.0);
                SCALED_FLOOR + ((255 - SCALED_FLOOR) as f32 * t).round() as i32
            } else {
                255
            };

            Rgb([c as u8, c as u8, c as u8])
        })
    }

    /// Save the disparities losslessly as a single channel (`Y`) 32 bit float OpenEXR file.
    pub fn save_exr<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = &self.data;
        let channels = SpecificChannels::build()
            .with_channel("Y")
            .with_pixel_fn(|Vec2(x, y): Vec2<usize>| (data.get_pixel(x as u32, y as u32)[0],));

        exr::prelude::Image::from_channels((self.width(), self.height()), channels)
            .write()
            .to_file(path)?;

        Ok(())
    }

    /// Save the scaled visualisation, format given by the file extension (PPM, PNG, ...).
    pub fn save_scaled<P: AsRef<Path>>(&self, path: P, occluded_distinct: bool) -> Result<()> {
        self.to_scaled(occluded_distinct).save(path)?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn clamp_u8(val: f32) -> u8 {
    if val.is_nan() || val < 0.0 {
        0
    } else if val > 255.0 {
        255
    } else {
        val as u8
    }
}
