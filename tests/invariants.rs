//! # Invariants
//!
//! Properties that must hold after every committed move, whatever the images.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

mod common;

use kz_disparity::error::Error;
use kz_disparity::kz2::LabelOrder;
use kz_disparity::prelude::*;

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

/// Random texture seen through a shift of 1 with a little noise on the right image.
fn noisy_frame(seed: u64) -> StereoFrame {
    let left = common::noise(12, 6, seed);
    let mut right = common::shifted(&left, 1, 128);
    let jitter = common::noise(12, 6, seed + 1);
    for (p, j) in right.pixels_mut().zip(jitter.pixels()) {
        p[0] = p[0].saturating_add(j[0] % 5);
    }

    StereoFrame::Gray { left, right }
}

fn params(randomize: bool) -> Params {
    Params {
        data_cost: DataCost::L1,
        denominator: 2,
        i_threshold2: 8,
        lambda1: 9,
        lambda2: 3,
        k: 20,
        iter_max: 3,
        randomize_every_iteration: randomize,
        seed: 7,
        border_occlusion: None,
    }
}

fn matcher(seed: u64, randomize: bool) -> Matcher {
    let mut m: Matcher = Matcher::new(&noisy_frame(seed)).unwrap();
    m.set_disp_range(-1, 3).unwrap();
    m.set_parameters(params(randomize)).unwrap();
    m
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn every_accepted_move_strictly_lowers_the_energy() {
    for seed in 0..3 {
        let mut m = matcher(seed, true);
        let order = LabelOrder {
            randomize: true,
            seed,
        };

        for sweep in 0..3 {
            for a in order.labels(sweep, (-1, 3)) {
                let before = m.compute_energy();
                assert_eq!(before, m.energy());

                let accepted = m.expansion_move(a).unwrap();
                let after = m.compute_energy();

                assert_eq!(after, m.energy());
                if accepted {
                    assert!(after < before, "move {} raised energy {} -> {}", a, before, after);
                } else {
                    assert_eq!(after, before);
                }
                assert!(m.state().is_consistent(), "inconsistent after move {}", a);
            }
        }
    }
}

#[test]
fn energy_is_non_increasing_across_sweeps() {
    let mut m = matcher(3, false);
    let report = m.run().unwrap();

    assert_eq!(report.history.len(), report.sweeps + 1);
    for w in report.history.windows(2) {
        assert!(w[1] <= w[0], "energy went up: {:?}", report.history);
    }
    assert_eq!(*report.history.last().unwrap(), m.energy());
    assert_eq!(m.energy(), m.compute_energy());
}

#[test]
fn extra_sweep_after_convergence_changes_nothing() {
    let mut m = matcher(4, false);
    m.set_parameters(Params {
        iter_max: 50,
        ..params(false)
    })
    .unwrap();

    let report = m.run().unwrap();
    assert_eq!(report.status, Status::Converged);

    let state = m.state().clone();
    let energy = m.energy();

    assert_eq!(m.sweep(report.sweeps).unwrap(), 0);
    assert_eq!(m.state(), &state);
    assert_eq!(m.energy(), energy);
}

#[test]
fn disparities_stay_within_range() {
    let mut m = matcher(5, true);
    m.run().unwrap();

    for d in m.x_left().values().iter().flatten() {
        assert!((-1..=3).contains(d), "disparity {} out of range", d);
    }
    for d in m.x_right().values().iter().flatten() {
        assert!((-3..=1).contains(d), "right disparity {} out of range", d);
    }
    assert!(m.state().is_consistent());
}

#[test]
fn same_seed_same_result() {
    let mut a = matcher(6, true);
    let mut b = matcher(6, true);

    let ra = a.run().unwrap();
    let rb = b.run().unwrap();

    assert_eq!(ra, rb);
    assert_eq!(a.x_left(), b.x_left());
}

#[test]
fn smoothness_above_edge_cost_is_rejected_before_running() {
    let mut m = matcher(9, false);
    let err = m.set_parameters(Params {
        lambda1: 1,
        lambda2: 2,
        ..params(false)
    });

    assert!(matches!(err, Err(Error::Configuration(_))));
    // the previous parameters are still in place
    assert_eq!(m.params(), &params(false));
    assert_eq!(m.status(), Status::Idle);
}

#[test]
fn empty_disparity_range_is_rejected() {
    let mut m = matcher(10, false);

    assert!(matches!(m.set_disp_range(3, 1), Err(Error::Configuration(_))));
}

#[test]
fn disparity_range_outside_image_is_rejected() {
    let mut m = matcher(11, false);

    assert!(matches!(m.set_disp_range(12, 20), Err(Error::DimensionMismatch(_))));
    assert!(matches!(m.set_disp_range(-30, -12), Err(Error::DimensionMismatch(_))));
}

#[test]
fn disparity_range_wider_than_image_is_rejected() {
    let mut m = matcher(13, false);

    // 12 wide on both sides, so disparities lie in [-11, 11]
    assert!(matches!(m.set_disp_range(i32::MIN, 0), Err(Error::DimensionMismatch(_))));
    assert!(matches!(m.set_disp_range(0, i32::MAX), Err(Error::DimensionMismatch(_))));
    assert!(matches!(m.set_disp_range(-12, 0), Err(Error::DimensionMismatch(_))));
    assert!(matches!(m.set_disp_range(0, 12), Err(Error::DimensionMismatch(_))));

    // the previous range is kept
    assert_eq!(m.disp_range(), Some((-1, 3)));

    m.set_disp_range(-11, 11).unwrap();
    m.set_parameters(Params {
        iter_max: 1,
        ..params(false)
    })
    .unwrap();
    assert!(m.estimate_k().unwrap().is_finite());
    m.kz2().unwrap();
    assert!(m.state().is_consistent());
}

#[test]
fn running_without_range_is_rejected() {
    let mut m: Matcher = Matcher::new(&noisy_frame(12)).unwrap();

    assert!(matches!(m.kz2(), Err(Error::Configuration(_))));
    assert!(matches!(m.expansion_move(0), Err(Error::Configuration(_))));
}

#[test]
fn images_with_different_heights_are_rejected() {
    let frame = StereoFrame::Gray {
        left: common::noise(8, 8, 0),
        right: common::noise(8, 7, 0),
    };

    assert!(matches!(Matcher::<kz_disparity::maxflow::Dinic>::new(&frame), Err(Error::DimensionMismatch(_))));
}
