//! Command line front-end: computes the left disparity map of a rectified stereo pair.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::fmt::SubscriberBuilder;

use kz_disparity::prelude::*;

#[derive(Parser)]
#[command(name = "kz2")]
#[command(about = "Stereo disparity by Kolmogorov-Zabih graph cuts")]
#[command(allow_negative_numbers = true)]
struct Cmd {
    /// Left image of the rectified pair
    left: PathBuf,
    /// Right image of the rectified pair
    right: PathBuf,
    /// Smallest disparity, a left pixel (x, y) matches right pixel (x + d, y)
    disp_min: i32,
    /// Largest disparity
    disp_max: i32,
    /// Float disparity map (OpenEXR), occluded pixels are NaN
    output: PathBuf,

    /// Viewable disparity map, format from the extension
    #[arg(long)]
    scaled: Option<PathBuf>,
    /// Draw occluded pixels black instead of cyan in the viewable map
    #[arg(long)]
    no_occlusion_color: bool,

    /// TOML parameter file, command line values take precedence
    #[arg(long)]
    params: Option<PathBuf>,
    /// Match colors instead of gray levels
    #[arg(long)]
    color: bool,
    #[arg(long, value_enum)]
    data_cost: Option<Cost>,
    /// Occlusion penalty, estimated from the images when absent
    #[arg(short = 'k', long)]
    k: Option<f32>,
    /// Smoothness weight, K/5 when absent
    #[arg(short = 'l', long)]
    lambda: Option<f32>,
    /// Smoothness cost not across an edge, 3*lambda when absent
    #[arg(long)]
    lambda1: Option<f32>,
    /// Smoothness cost across an edge, lambda when absent
    #[arg(long)]
    lambda2: Option<f32>,
    /// Intensity step treated as an edge
    #[arg(short = 't', long)]
    threshold: Option<i64>,
    /// Number of sweeps over the disparities
    #[arg(short = 'i', long)]
    iter_max: Option<usize>,
    /// Random label order at every sweep
    #[arg(short = 'r', long)]
    random: bool,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Cost {
    L1,
    L2,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();

    let left = image::open(&cmd.left).with_context(|| format!("reading {}", cmd.left.display()))?;
    let right =
        image::open(&cmd.right).with_context(|| format!("reading {}", cmd.right.display()))?;
    let frame = StereoFrame::from_dynamic(&left, &right, cmd.color);

    let mut params = match &cmd.params {
        Some(path) => Params::from_file(path)
            .with_context(|| format!("loading parameters from {}", path.display()))?,
        None => Params::default(),
    };
    if let Some(cost) = cmd.data_cost {
        params.data_cost = match cost {
            Cost::L1 => DataCost::L1,
            Cost::L2 => DataCost::L2,
        };
    }
    if let Some(t) = cmd.threshold {
        params.i_threshold2 = t;
    }
    if let Some(n) = cmd.iter_max {
        params.iter_max = n;
    }
    if let Some(seed) = cmd.seed {
        params.seed = seed;
    }
    params.randomize_every_iteration |= cmd.random;

    let mut m: Matcher = Matcher::new(&frame)?;
    m.set_disp_range(cmd.disp_min, cmd.disp_max)?;
    m.set_parameters(params.clone())?;

    // weights from a parameter file are kept unless overridden on the command line
    let auto = AutoParams {
        k: cmd.k,
        lambda: cmd.lambda,
        lambda1: cmd.lambda1,
        lambda2: cmd.lambda2,
    };
    let params = if cmd.params.is_none() || auto != AutoParams::default() {
        auto.resolve(params, || m.estimate_k())?
    } else {
        params
    };
    tracing::info!(
        k = params.k,
        lambda1 = params.lambda1,
        lambda2 = params.lambda2,
        denominator = params.denominator,
        "parameters"
    );
    m.set_parameters(params)?;

    let report = m.kz2()?;
    tracing::info!(status = ?report.status, energy = report.energy, "done");

    let map = m.disparity_map();
    map.save_exr(&cmd.output)
        .with_context(|| format!("writing {}", cmd.output.display()))?;
    if let Some(path) = &cmd.scaled {
        map.save_scaled(path, !cmd.no_occlusion_color)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}
