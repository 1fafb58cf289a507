//! # Trace-Length Distribution Planner
//!
//! Turns `(min_events, max_events, total_traces, shape)` into a histogram
//! `length -> count` that drives the solver loop: for each bucket the solver
//! is invoked once per trace with the bucket's length pinned.
//!
//! Uniform and custom shapes sample the requested range directly. The
//! gaussian shape weights each integer length in range by the normal pdf at
//! that point, so the requested total is always preserved instead of being
//! silently truncated at the range boundaries.

use crate::config::{DistributorType, GeneratorConfig};
use rand::distributions::{Distribution, Uniform, WeightedIndex};
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Compute the trace-length histogram for `total` traces.
///
/// The configuration is assumed validated (`GeneratorConfig::validate`);
/// the generator runs validation before any planning.
pub fn plan_distribution<R: Rng>(
    config: &GeneratorConfig,
    total: u32,
    rng: &mut R,
) -> BTreeMap<u32, u32> {
    let mut histogram = BTreeMap::new();
    if total == 0 {
        return histogram;
    }
    let (min, max) = (config.min_events, config.max_events);
    if min == max {
        histogram.insert(min, total);
        return histogram;
    }

    match config.distributor_type {
        DistributorType::Uniform => {
            let lengths = Uniform::new_inclusive(min, max);
            for _ in 0..total {
                *histogram.entry(lengths.sample(rng)).or_insert(0) += 1;
            }
        }
        DistributorType::Custom => {
            let probabilities = config
                .custom_probabilities
                .clone()
                .unwrap_or_else(|| vec![1.0; (max - min + 1) as usize]);
            sample_weighted(&probabilities, min, total, rng, &mut histogram);
        }
        DistributorType::Gaussian => {
            let loc = config.loc.unwrap_or(f64::from(min));
            let scale = config.scale.unwrap_or(0.0);
            let weights = gaussian_weights(min, max, loc, scale);
            sample_weighted(&weights, min, total, rng, &mut histogram);
        }
    }

    debug!(?histogram, total, "trace length distribution planned");
    histogram
}

/// Normal pdf weights at the integer lengths in `[min, max]`. A zero scale
/// concentrates all mass on the length closest to `loc`.
fn gaussian_weights(min: u32, max: u32, loc: f64, scale: f64) -> Vec<f64> {
    let buckets = (max - min + 1) as usize;
    if scale == 0.0 {
        let peak = loc.round().clamp(f64::from(min), f64::from(max)) as u32;
        let mut weights = vec![0.0; buckets];
        weights[(peak - min) as usize] = 1.0;
        return weights;
    }
    let mut weights: Vec<f64> = (min..=max)
        .map(|k| {
            let z = (f64::from(k) - loc) / scale;
            (-0.5 * z * z).exp()
        })
        .collect();
    // pdf mass can underflow when loc is far outside the range; fall back
    // to the nearest endpoint
    if weights.iter().sum::<f64>() == 0.0 {
        let idx = if loc < f64::from(min) { 0 } else { buckets - 1 };
        weights[idx] = 1.0;
    }
    weights
}

fn sample_weighted<R: Rng>(
    weights: &[f64],
    min: u32,
    total: u32,
    rng: &mut R,
    histogram: &mut BTreeMap<u32, u32>,
) {
    match WeightedIndex::new(weights) {
        Ok(index) => {
            for _ in 0..total {
                let length = min + index.sample(rng) as u32;
                *histogram.entry(length).or_insert(0) += 1;
            }
        }
        Err(_) => {
            // degenerate weights: collapse everything onto the minimum
            histogram.insert(min, total);
        }
    }
}
