//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the disparity crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid parameters or disparity range, raised before any graph is built.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The stereo pair cannot be matched over the requested disparity range.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The min-cut answer broke a uniqueness or range invariant of the expansion move.
    #[error("Min-cut solver returned an inconsistent labelling: {0}")]
    SolverInconsistency(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("OpenEXR error: {0}")]
    Exr(#[from] exr::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse parameters: {0}")]
    Toml(#[from] toml::de::Error),
}
