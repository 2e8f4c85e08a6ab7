//! # Disparity Computation
//!
//! This crate provides dense disparity map computation for rectified stereo pairs by
//! Kolmogorov-Zabih graph-cut energy minimisation, with explicit occlusions and uniqueness.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod disparity;
pub mod energy;
pub mod error;
pub mod frame;
pub mod kz2;
pub mod maxflow;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub mod prelude {
    pub use crate::disparity::{DisparityAlgorithm, DisparityMap, OCCLUDED_COLOR};
    pub use crate::frame::{Coord, StereoFrame};
    pub use crate::kz2::{
        params::{AutoParams, DataCost, Params},
        Kz2, Matcher, RunReport, Status,
    };
}
