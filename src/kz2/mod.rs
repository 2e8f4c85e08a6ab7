//! # Kolmogorov-Zabih disparity computation
//!
//! This module provides an implementation of the stereo algorithm from Kolmogorov & Zabih,
//! ("Computing Visual Correspondence with Occlusions using Graph Cuts")[https://www.cs.cornell.edu/rdz/Papers/KZ-ICCV01-tr.pdf]
//!
//! The unknowns are assignments `(l, r)` of a left pixel to a right pixel on the same row. An
//! assignment is active or not, and at most one active assignment may touch any pixel of either
//! image. A pixel with no active assignment is occluded. The energy of a configuration is
//!
//! - `denominator * D(l, r) - K` for every active assignment,
//! - a Potts smoothness cost for every pair of neighbours whose assignments disagree,
//!
//! and is minimised by alpha-expansion: for each disparity `alpha` one min-cut decides which
//! pixels switch to `alpha`, which keep their assignment and which become occluded.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod build;
pub mod params;
pub mod penalty;
pub mod state;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::marker::PhantomData;
use tracing::{debug, info, warn};

use crate::disparity::{DisparityAlgorithm, DisparityMap};
use crate::energy::{Energy, Value};
use crate::error::*;
use crate::frame::{Coord, StereoFrame, NEIGHBOURS};
use crate::maxflow::{Dinic, MaxFlowGraph};

use params::Params;
use penalty::EnergyModel;
use state::{DisparityField, DisparityState};

#[cfg(feature = "statistics")]
use plotters::prelude::*;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Progress of the expansion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Running,
    /// Every label failed to lower the energy since the last improvement.
    Converged,
    /// `iter_max` sweeps elapsed while some label could still improve.
    IterationLimitReached,
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// The expansion controller and its state for one stereo pair.
///
/// ```no_run
/// # use kz_disparity::prelude::*;
/// # fn main() -> kz_disparity::error::Result<()> {
/// # let frame: StereoFrame = unimplemented!();
/// let mut m: Matcher = Matcher::new(&frame)?;
/// m.set_disp_range(-15, 0)?;
/// m.set_parameters(Params::default())?;
/// m.kz2()?;
/// let map = m.disparity_map();
/// # Ok(())
/// # }
/// ```
pub struct Matcher<G: MaxFlowGraph = Dinic> {
    model: EnergyModel,
    params: Params,
    disp_range: Option<(i32, i32)>,
    state: DisparityState,
    energy: Value,
    status: Status,
    _graph: PhantomData<G>,
}

/// Summary of a call to `Matcher::run`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub status: Status,
    pub sweeps: usize,
    /// Number of accepted expansion moves.
    pub moves: usize,
    pub energy: Value,
    /// Energy before the first sweep and after each sweep.
    pub history: Vec<Value>,
}

/// Label visiting order, either ascending or a seeded shuffle per sweep.
#[derive(Debug, Clone, Copy)]
pub struct LabelOrder {
    pub randomize: bool,
    pub seed: u64,
}

/// `DisparityAlgorithm` front-end running KZ2 to completion on each frame.
#[derive(Debug, Clone)]
pub struct Kz2 {
    pub params: Params,
    pub min_disparity: i32,
    pub max_disparity: i32,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl<G: MaxFlowGraph> Matcher<G> {
    /// Wrap a stereo pair and precompute the sub-pixel intensity ranges of both images.
    ///
    /// Every pixel starts occluded, with default parameters and no disparity range.
    pub fn new(frame: &StereoFrame) -> Result<Self> {
        frame.validate()?;

        let model = EnergyModel::new(frame);
        let state = DisparityState::occluded(model.left_size(), model.right_size());

        Ok(Matcher {
            model,
            params: Params::default(),
            disp_range: None,
            state,
            energy: 0,
            status: Status::Idle,
            _graph: PhantomData,
        })
    }

    /// Set the range of disparities `[base, max]` searched for, resetting the state to occluded.
    ///
    /// Every disparity of the range must match at least one pair of pixels, i.e. lie within
    /// `[1 - left width, right width - 1]`.
    pub fn set_disp_range(&mut self, base: i32, max: i32) -> Result<()> {
        if base > max {
            return Err(Error::Configuration(format!(
                "disparity range [{}, {}] is empty",
                base, max
            )));
        }

        let (wl, wr) = (self.model.left_size().width, self.model.right_size().width);
        if base < 1 - wl || max > wr - 1 {
            return Err(Error::DimensionMismatch(format!(
                "disparity range [{}, {}] exceeds [{}, {}] for a {} wide left and {} wide right image",
                base,
                max,
                1 - wl,
                wr - 1,
                wl,
                wr
            )));
        }

        self.disp_range = Some((base, max));
        self.reset();
        Ok(())
    }

    /// Validate and install parameters, resetting the state to occluded.
    pub fn set_parameters(&mut self, params: Params) -> Result<()> {
        params.validate()?;
        self.params = params;
        self.reset();
        Ok(())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn disp_range(&self) -> Option<(i32, i32)> {
        self.disp_range
    }

    /// Current energy, tracked across moves.
    pub fn energy(&self) -> Value {
        self.energy
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn state(&self) -> &DisparityState {
        &self.state
    }

    pub fn x_left(&self) -> &DisparityField {
        self.state.x_left()
    }

    pub fn x_right(&self) -> &DisparityField {
        self.state.x_right()
    }

    /// Run the full algorithm and return how it terminated.
    pub fn kz2(&mut self) -> Result<RunReport> {
        self.require_range()?;
        self.run()
    }

    /// Average over left pixels of the k-th smallest data penalty, a good occlusion penalty.
    ///
    /// `k` is a quarter of the number of disparities, at least 3. The raw data term is used, i.e.
    /// without the denominator.
    pub fn estimate_k(&self) -> Result<f32> {
        let (base, max) = self.require_range()?;
        let n = (max - base + 1) as usize;
        let k = ((n + 2) / 4).max(3);
        let right = self.model.right_size();

        let mut sum = 0i64;
        let mut count = 0usize;
        let mut costs = Vec::with_capacity(n);

        for p in self.model.left_size().coords() {
            costs.clear();
            for d in base..=max {
                let q = p.shift(d);
                if right.contains(q) {
                    costs.push(self.model.data_penalty(p, q, self.params.data_cost));
                }
            }
            if costs.is_empty() {
                continue;
            }

            let kth = k.min(costs.len()) - 1;
            let (_, v, _) = costs.select_nth_unstable(kth);
            sum += *v;
            count += 1;
        }

        if count == 0 {
            return Err(Error::DimensionMismatch(
                "no left pixel has a match within the disparity range".into(),
            ));
        }

        Ok(sum as f32 / count as f32)
    }

    /// Occlusion penalty of left pixel `l`, which depends on the border policy.
    pub fn occlusion_penalty(&self, l: Coord) -> Value {
        let border = match (self.disp_range, self.params.border_occlusion) {
            (Some((base, max)), Some(k)) => {
                let right = self.model.right_size();
                if !right.contains(l.shift(base)) || !right.contains(l.shift(max)) {
                    Some(k)
                } else {
                    None
                }
            }
            _ => None,
        };

        border.unwrap_or(self.params.k)
    }

    /// Raw data cost of matching `l` with `r`.
    pub fn data_penalty(&self, l: Coord, r: Coord) -> Value {
        self.model.data_penalty(l, r, self.params.data_cost)
    }

    /// Cost of the assignment `(l, r)` being active, relative to leaving `l` occluded.
    pub fn data_occlusion_penalty(&self, l: Coord, r: Coord) -> Value {
        self.params.denominator * self.data_penalty(l, r) - self.occlusion_penalty(l)
    }

    pub fn smoothness_penalty(&self, p: Coord, np: Coord, d: i32) -> Value {
        self.model.smoothness_penalty(p, np, d, &self.params)
    }

    /// Energy of the current state, computed from scratch.
    pub fn compute_energy(&self) -> Value {
        let size = self.model.left_size();
        let right = self.model.right_size();
        let x = self.state.x_left();
        let mut e = 0;

        for p in size.coords() {
            let d = x.get(p);
            if let Some(d) = d {
                e += self.data_occlusion_penalty(p, p.shift(d));
            }

            for &offset in NEIGHBOURS.iter() {
                let np = p + offset;
                if !size.contains(np) {
                    continue;
                }

                let nd = x.get(np);
                if d == nd {
                    continue;
                }
                if let Some(d) = d {
                    if right.contains(np.shift(d)) {
                        e += self.smoothness_penalty(p, np, d);
                    }
                }
                if let Some(nd) = nd {
                    if right.contains(p.shift(nd)) {
                        e += self.smoothness_penalty(p, np, nd);
                    }
                }
            }
        }

        e
    }

    /// Try the expansion move of label `a`, keeping it only if it strictly lowers the energy.
    ///
    /// Returns whether the move was accepted.
    pub fn expansion_move(&mut self, a: i32) -> Result<bool> {
        let (base, max) = self.require_range()?;
        if a < base || a > max {
            return Err(Error::Configuration(format!(
                "label {} outside of the disparity range [{}, {}]",
                a, base, max
            )));
        }

        let mut e = Energy::<G>::new();
        let snapshot = self.build_graph(&mut e, a);

        let old = self.energy;
        let new = e.minimize();
        if new >= old {
            return Ok(false);
        }

        self.state.commit(&e, &snapshot)?;
        self.energy = new;
        debug_assert_eq!(self.energy, self.compute_energy(), "energy out of sync");

        debug!(alpha = a, old, new, "expansion move accepted");
        Ok(true)
    }

    /// One pass over every label in the order of sweep `index`. Returns the accepted moves.
    pub fn sweep(&mut self, index: usize) -> Result<usize> {
        let labels = self.order().labels(index, self.require_range()?);
        let mut accepted = 0;

        for a in labels {
            if self.expansion_move(a)? {
                accepted += 1;
            }
        }

        Ok(accepted)
    }

    /// Alpha-expansion until convergence or `iter_max` sweeps.
    ///
    /// A label is not retried until another label has improved the energy since it was last
    /// tried, and the run has converged once all labels have been tried in a row without success.
    pub fn run(&mut self) -> Result<RunReport> {
        let range = self.require_range()?;
        let n = (range.1 - range.0 + 1) as usize;
        let order = self.order();

        self.energy = self.compute_energy();
        self.status = Status::Running;
        info!(
            min = range.0,
            max = range.1,
            energy = self.energy,
            "starting alpha-expansion"
        );

        let mut history = vec![self.energy];
        let mut tried = vec![false; n];
        let mut tried_count = 0;
        let mut moves = 0;
        let mut sweeps = 0;

        while sweeps < self.params.iter_max && tried_count < n {
            for a in order.labels(sweeps, range) {
                let i = (a - range.0) as usize;
                if tried[i] {
                    continue;
                }

                if self.expansion_move(a)? {
                    moves += 1;
                    tried.iter_mut().for_each(|t| *t = false);
                    tried_count = 0;
                }
                tried[i] = true;
                tried_count += 1;

                if tried_count == n {
                    break;
                }
            }

            sweeps += 1;
            history.push(self.energy);
            info!(sweep = sweeps, energy = self.energy, "sweep done");
        }

        self.status = if tried_count == n {
            Status::Converged
        } else {
            warn!(sweeps, "iteration limit reached before convergence");
            Status::IterationLimitReached
        };

        #[cfg(feature = "statistics")]
        plot_energy(&history);

        info!(status = ?self.status, sweeps, moves, energy = self.energy, "alpha-expansion done");

        Ok(RunReport {
            status: self.status,
            sweeps,
            moves,
            energy: self.energy,
            history,
        })
    }

    /// The left disparity map, occluded pixels as NaN.
    pub fn disparity_map(&self) -> DisparityMap {
        let size = self.model.left_size();
        let mut map = DisparityMap::new(size.width as usize, size.height as usize);

        for p in size.coords() {
            let val = match self.x_left().get(p) {
                Some(d) => d as f32,
                None => f32::NAN,
            };
            map.put(p.x as usize, p.y as usize, val);
        }

        if let Some((base, max)) = self.disp_range {
            map.min_disp = Some(base as f32);
            map.max_disp = Some(max as f32);
        }

        map
    }

    fn order(&self) -> LabelOrder {
        LabelOrder {
            randomize: self.params.randomize_every_iteration,
            seed: self.params.seed,
        }
    }

    fn require_range(&self) -> Result<(i32, i32)> {
        self.disp_range.ok_or_else(|| {
            Error::Configuration("the disparity range must be set before running".into())
        })
    }

    fn reset(&mut self) {
        self.state = DisparityState::occluded(self.model.left_size(), self.model.right_size());
        self.energy = 0;
        self.status = Status::Idle;
    }
}

impl LabelOrder {
    /// Labels of `range` in the order used by sweep `sweep`.
    pub fn labels(&self, sweep: usize, range: (i32, i32)) -> Vec<i32> {
        let mut labels: Vec<i32> = (range.0..=range.1).collect();

        if self.randomize {
            let seed = self.seed ^ (sweep as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            labels.shuffle(&mut StdRng::seed_from_u64(seed));
        }

        labels
    }
}

impl Kz2 {
    pub fn new(params: Params, min_disparity: i32, max_disparity: i32) -> Self {
        Kz2 {
            params,
            min_disparity,
            max_disparity,
        }
    }
}

impl DisparityAlgorithm for Kz2 {
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap> {
        let mut m: Matcher = Matcher::new(frame)?;
        m.set_disp_range(self.min_disparity, self.max_disparity)?;
        m.set_parameters(self.params.clone())?;
        m.kz2()?;

        Ok(m.disparity_map())
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

#[cfg(feature = "statistics")]
fn plot_energy(history: &[Value]) {
    if let Err(e) = try_plot_energy(history) {
        warn!(error = %e, "could not plot energy history");
    }
}

#[cfg(feature = "statistics")]
fn try_plot_energy(history: &[Value]) -> std::result::Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("plots/kz2")?;

    let lo = history.iter().copied().min().unwrap_or(0);
    let hi = history.iter().copied().max().unwrap_or(0);

    let area = BitMapBackend::new("plots/kz2/energy.png", (800, 600)).into_drawing_area();
    area.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&area)
        .caption("Energy per sweep", ("sans-serif", 20).into_font())
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_ranged(0..history.len(), lo..(hi + 1))?;

    chart.configure_mesh().draw()?;

    chart
        .draw_series(LineSeries::new(
            history.iter().copied().enumerate(),
            &RED,
        ))?
        .label("Energy")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    Ok(())
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_order_without_randomisation() {
        let order = LabelOrder {
            randomize: false,
            seed: 3,
        };

        assert_eq!(order.labels(0, (-2, 2)), vec![-2, -1, 0, 1, 2]);
        assert_eq!(order.labels(5, (-2, 2)), vec![-2, -1, 0, 1, 2]);
    }

    #[test]
    fn seeded_order_is_a_reproducible_permutation() {
        let order = LabelOrder {
            randomize: true,
            seed: 11,
        };

        let first = order.labels(1, (0, 15));
        assert_eq!(first, order.labels(1, (0, 15)));

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, (0..=15).collect::<Vec<_>>());
    }
}
