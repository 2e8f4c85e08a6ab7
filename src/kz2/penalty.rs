//! # Energy model
//!
//! Data and smoothness penalties for gray and color pairs. The variant is picked once from the
//! frame, the rest of the algorithm only sees `EnergyModel`.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::frame::{split_rgb, Coord, Size, StereoFrame, SubPixelImage};
use super::params::{DataCost, Params};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Saturation of the per-channel intensity distance in the data term.
pub const CUTOFF: i32 = 30;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum EnergyModel {
    Gray {
        left: SubPixelImage,
        right: SubPixelImage,
    },
    Color {
        left: [SubPixelImage; 3],
        right: [SubPixelImage; 3],
    },
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl EnergyModel {
    /// Precompute the sub-pixel ranges of both images.
    pub fn new(frame: &StereoFrame) -> Self {
        match frame {
            StereoFrame::Gray { left, right } => EnergyModel::Gray {
                left: SubPixelImage::new(left.clone()),
                right: SubPixelImage::new(right.clone()),
            },
            StereoFrame::Color { left, right } => EnergyModel::Color {
                left: split_rgb(left),
                right: split_rgb(right),
            },
        }
    }

    pub fn left_size(&self) -> Size {
        match self {
            EnergyModel::Gray { left, .. } => left.size(),
            EnergyModel::Color { left, .. } => left[0].size(),
        }
    }

    pub fn right_size(&self) -> Size {
        match self {
            EnergyModel::Gray { right, .. } => right.size(),
            EnergyModel::Color { right, .. } => right[0].size(),
        }
    }

    /// Cost of matching left pixel `l` with right pixel `r`, both inside their image.
    ///
    /// Zero when either intensity falls within the other pixel's sub-pixel range. Color costs are
    /// averaged over the channels so that weights carry over from gray pairs.
    pub fn data_penalty(&self, l: Coord, r: Coord, cost: DataCost) -> i64 {
        match self {
            EnergyModel::Gray { left, right } => norm(range_distance(left, right, l, r), cost),
            EnergyModel::Color { left, right } => {
                let sum: i64 = left
                    .iter()
                    .zip(right.iter())
                    .map(|(lc, rc)| norm(range_distance(lc, rc, l, r), cost))
                    .sum();
                sum / 3
            }
        }
    }

    /// Cost of a discontinuity between left neighbours `p` and `np` at disparity `d`.
    ///
    /// The pair is an edge, and costs `lambda2`, when the intensity step between `p` and `np` or
    /// between their matches `p + d`, `np + d` reaches `i_threshold2` in any channel.
    pub fn smoothness_penalty(&self, p: Coord, np: Coord, d: i32, params: &Params) -> i64 {
        let step = match self {
            EnergyModel::Gray { left, right } => max_step(left, right, p, np, d),
            EnergyModel::Color { left, right } => left
                .iter()
                .zip(right.iter())
                .map(|(lc, rc)| max_step(lc, rc, p, np, d))
                .max()
                .unwrap_or(0),
        };

        if (step as i64) < params.i_threshold2 {
            params.lambda1
        } else {
            params.lambda2
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Distance of each intensity to the other pixel's range, the smaller of the two, saturated.
fn range_distance(left: &SubPixelImage, right: &SubPixelImage, l: Coord, r: Coord) -> i32 {
    let distance = |v: i32, lo: i32, hi: i32| {
        if v < lo {
            lo - v
        } else if v > hi {
            v - hi
        } else {
            0
        }
    };

    let dl = distance(left.value(l), right.min(r), right.max(r));
    let dr = distance(right.value(r), left.min(l), left.max(l));

    dl.min(dr).min(CUTOFF)
}

fn norm(d: i32, cost: DataCost) -> i64 {
    let d = d as i64;
    match cost {
        DataCost::L1 => d,
        DataCost::L2 => d * d,
    }
}

fn max_step(left: &SubPixelImage, right: &SubPixelImage, p: Coord, np: Coord, d: i32) -> i32 {
    let dl = (left.value(p) - left.value(np)).abs();
    let dr = (right.value(p.shift(d)) - right.value(np.shift(d))).abs();
    dl.max(dr)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gray_model(left: &[u8], right: &[u8]) -> EnergyModel {
        let w = left.len() as u32;
        EnergyModel::new(&StereoFrame::Gray {
            left: GrayImage::from_fn(w, 1, |x, _| Luma([left[x as usize]])),
            right: GrayImage::from_fn(w, 1, |x, _| Luma([right[x as usize]])),
        })
    }

    #[test]
    fn identical_pixels_are_free() {
        let model = gray_model(&[10, 10, 10], &[10, 10, 10]);

        assert_eq!(model.data_penalty(Coord::new(1, 0), Coord::new(1, 0), DataCost::L2), 0);
    }

    #[test]
    fn data_penalty_uses_distance_outside_range() {
        let model = gray_model(&[10, 10, 10], &[20, 20, 20]);
        let (l, r) = (Coord::new(1, 0), Coord::new(1, 0));

        assert_eq!(model.data_penalty(l, r, DataCost::L1), 10);
        assert_eq!(model.data_penalty(l, r, DataCost::L2), 100);
    }

    #[test]
    fn sub_pixel_range_absorbs_interpolation() {
        // 40 lies half way between the left pixel and its right neighbour
        let model = gray_model(&[0, 30, 50], &[40, 40, 40]);

        assert_eq!(model.data_penalty(Coord::new(1, 0), Coord::new(0, 0), DataCost::L1), 0);
    }

    #[test]
    fn data_penalty_saturates() {
        let model = gray_model(&[0, 0, 0], &[200, 200, 200]);

        assert_eq!(
            model.data_penalty(Coord::new(0, 0), Coord::new(0, 0), DataCost::L2),
            (CUTOFF * CUTOFF) as i64
        );
    }

    #[test]
    fn smoothness_distinguishes_edges() {
        let params = Params {
            i_threshold2: 8,
            lambda1: 6,
            lambda2: 2,
            ..Params::default()
        };
        let model = gray_model(&[10, 12, 100, 100], &[10, 12, 100, 100]);

        assert_eq!(model.smoothness_penalty(Coord::new(0, 0), Coord::new(1, 0), 0, &params), 6);
        assert_eq!(model.smoothness_penalty(Coord::new(1, 0), Coord::new(2, 0), 0, &params), 2);
    }

    #[test]
    fn color_edge_in_one_channel_is_an_edge() {
        let params = Params {
            i_threshold2: 8,
            lambda1: 6,
            lambda2: 2,
            ..Params::default()
        };
        let img = RgbImage::from_fn(2, 1, |x, _| Rgb([10, 10, if x == 0 { 0 } else { 50 }]));
        let model = EnergyModel::new(&StereoFrame::Color {
            left: img.clone(),
            right: img,
        });

        assert_eq!(model.smoothness_penalty(Coord::new(0, 0), Coord::new(1, 0), 0, &params), 2);
        assert_eq!(model.data_penalty(Coord::new(0, 0), Coord::new(0, 0), DataCost::L1), 0);
    }
}
