//! # Stereo frames
//!
//! This module wraps a rectified stereo pair and precomputes, for every pixel, the range of
//! intensities reachable by half-pixel interpolation with its neighbours. The data term uses these
//! ranges so that a match is not penalised for sampling noise.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::map::{blue_channel, green_channel, red_channel};
use std::ops::{Add, Sub};

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Offsets used to enumerate each 4-connected pair of pixels exactly once.
pub const NEIGHBOURS: [Coord; 2] = [Coord { x: 1, y: 0 }, Coord { x: 0, y: 1 }];

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Integer pixel coordinate. May lie outside an image, use `Size::contains` before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

/// Image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// A rectified stereo pair, either grayscale or color.
#[derive(Debug, Clone)]
pub enum StereoFrame {
    Gray { left: GrayImage, right: GrayImage },
    Color { left: RgbImage, right: RgbImage },
}

/// One intensity plane with the neighbourhood range of every pixel.
#[derive(Debug, Clone)]
pub struct SubPixelImage {
    image: GrayImage,
    min: GrayImage,
    max: GrayImage,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Coord { x, y }
    }

    /// Shift horizontally by `d` pixels.
    pub fn shift(self, d: i32) -> Self {
        Coord::new(self.x + d, self.y)
    }
}

impl Add for Coord {
    type Output = Coord;

    fn add(self, rhs: Coord) -> Coord {
        Coord::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coord {
    type Output = Coord;

    fn sub(self, rhs: Coord) -> Coord {
        Coord::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Size {
            width: width as i32,
            height: height as i32,
        }
    }

    pub fn contains(&self, p: Coord) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }

    /// Number of pixels.
    pub fn area(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Raster index of a coordinate known to be inside.
    pub fn index(&self, p: Coord) -> usize {
        p.y as usize * self.width as usize + p.x as usize
    }

    /// All coordinates in raster order.
    pub fn coords(self) -> impl Iterator<Item = Coord> {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Coord::new(x, y)))
    }
}

impl StereoFrame {
    /// Build a frame from two decoded images, converting both to gray or both to RGB.
    pub fn from_dynamic(left: &DynamicImage, right: &DynamicImage, color: bool) -> Self {
        if color {
            StereoFrame::Color {
                left: left.to_rgb8(),
                right: right.to_rgb8(),
            }
        } else {
            StereoFrame::Gray {
                left: left.to_luma8(),
                right: right.to_luma8(),
            }
        }
    }

    pub fn left_size(&self) -> Size {
        match self {
            StereoFrame::Gray { left, .. } => Size::new(left.width(), left.height()),
            StereoFrame::Color { left, .. } => Size::new(left.width(), left.height()),
        }
    }

    pub fn right_size(&self) -> Size {
        match self {
            StereoFrame::Gray { right, .. } => Size::new(right.width(), right.height()),
            StereoFrame::Color { right, .. } => Size::new(right.width(), right.height()),
        }
    }

    pub fn is_color(&self) -> bool {
        matches!(self, StereoFrame::Color { .. })
    }

    /// Check that the two images share a scanline structure.
    pub fn validate(&self) -> Result<()> {
        let (l, r) = (self.left_size(), self.right_size());

        if l.area() == 0 || r.area() == 0 {
            return Err(Error::DimensionMismatch(format!(
                "empty image in stereo pair ({}x{} / {}x{})",
                l.width, l.height, r.width, r.height
            )));
        }

        if l.height != r.height {
            return Err(Error::DimensionMismatch(format!(
                "left image has {} rows but right image has {}",
                l.height, r.height
            )));
        }

        Ok(())
    }
}

impl SubPixelImage {
    /// Wrap a plane and compute its neighbourhood min/max.
    ///
    /// The range of a pixel covers its own value and the averages with its 4-neighbours, i.e. the
    /// values a linear interpolation could take half a pixel away.
    pub fn new(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let mut min = GrayImage::new(width, height);
        let mut max = GrayImage::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let i = image.get_pixel(x, y)[0] as u32;
                let half = |xn: u32, yn: u32| (image.get_pixel(xn, yn)[0] as u32 + i) / 2;

                let mut lo = i;
                let mut hi = i;
                let mut visit = |v: u32| {
                    lo = lo.min(v);
                    hi = hi.max(v);
                };

                if x > 0 {
                    visit(half(x - 1, y));
                }
                if x + 1 < width {
                    visit(half(x + 1, y));
                }
                if y > 0 {
                    visit(half(x, y - 1));
                }
                if y + 1 < height {
                    visit(half(x, y + 1));
                }

                min.put_pixel(x, y, Luma([lo as u8]));
                max.put_pixel(x, y, Luma([hi as u8]));
            }
        }

        SubPixelImage { image, min, max }
    }

    pub fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    pub fn value(&self, p: Coord) -> i32 {
        self.image.get_pixel(p.x as u32, p.y as u32)[0] as i32
    }

    pub fn min(&self, p: Coord) -> i32 {
        self.min.get_pixel(p.x as u32, p.y as u32)[0] as i32
    }

    pub fn max(&self, p: Coord) -> i32 {
        self.max.get_pixel(p.x as u32, p.y as u32)[0] as i32
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Split a color image into its three channels, each with its own sub-pixel range.
pub(crate) fn split_rgb(image: &RgbImage) -> [SubPixelImage; 3] {
    [
        SubPixelImage::new(red_channel(image)),
        SubPixelImage::new(green_channel(image)),
        SubPixelImage::new(blue_channel(image)),
    ]
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_has_degenerate_range() {
        let plane = SubPixelImage::new(GrayImage::from_pixel(3, 3, image::Luma([42])));

        for p in plane.size().coords() {
            assert_eq!(plane.min(p), 42);
            assert_eq!(plane.max(p), 42);
        }
    }

    #[test]
    fn range_covers_half_way_neighbours() {
        // 0 100 200 on a single row
        let plane = SubPixelImage::new(GrayImage::from_fn(3, 1, |x, _| image::Luma([x as u8 * 100])));

        assert_eq!((plane.min(Coord::new(0, 0)), plane.max(Coord::new(0, 0))), (0, 50));
        assert_eq!((plane.min(Coord::new(1, 0)), plane.max(Coord::new(1, 0))), (50, 150));
        assert_eq!((plane.min(Coord::new(2, 0)), plane.max(Coord::new(2, 0))), (150, 200));
    }

    #[test]
    fn mismatched_heights_are_rejected() {
        let frame = StereoFrame::Gray {
            left: GrayImage::new(4, 4),
            right: GrayImage::new(4, 3),
        };

        assert!(matches!(frame.validate(), Err(Error::DimensionMismatch(_))));
    }
}
