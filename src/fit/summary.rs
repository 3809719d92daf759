//! Whole-culture kinetic figures and per-interval phase labels.
//!
//! These are the bookkeeping quantities reported next to the detected growth
//! rate: yields on substrate, volumetric productivities, specific rates
//! normalized by mean biomass, and a coarse lag/growth/stationary/death
//! classification of each sampling interval.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{
    CultureSummary, ExponentialPhaseResult, GrowthPhase, IntervalPhase, Measurements, PhaseSearch,
};
use crate::error::KineticsError;
use crate::fit::phase::detect_exponential_phase_with;

/// Relative rise above which an interval counts as growth.
const GROWTH_RISE: f64 = 0.05;
/// Relative change below which an interval counts as stationary.
const STATIONARY_BAND: f64 = 0.03;
/// Relative fall above which an interval counts as decline.
const DEATH_FALL: f64 = 0.05;

/// Compute the kinetic summary of one experiment.
pub fn summarize_culture(
    data: &Measurements,
    search: &PhaseSearch,
) -> Result<CultureSummary, KineticsError> {
    let n = data.time.len();
    for (name, len) in [
        ("biomass", data.biomass.len()),
        ("substrate", data.substrate.len()),
        ("product", data.product.len()),
    ] {
        if len != n {
            return Err(KineticsError::mismatch("time", n, name, len));
        }
    }
    if n == 0 {
        return Err(KineticsError::InsufficientData {
            required: 1,
            found: 0,
        });
    }

    let last = n - 1;
    let biomass_initial = data.biomass[0];
    let biomass_final = data.biomass[last];
    let biomass_max = data.biomass.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let substrate_consumed = data.substrate[0] - data.substrate[last];
    let product_formed = data.product[last] - data.product[0];
    let culture_time = data.time[last] - data.time[0];

    let phase = detect_exponential_phase_with(&data.time, &data.biomass, search)?;

    let (biomass_yield, product_yield) = if substrate_consumed > 0.0 {
        (
            (biomass_final - biomass_initial) / substrate_consumed,
            product_formed / substrate_consumed,
        )
    } else {
        (0.0, 0.0)
    };

    let (biomass_productivity, product_productivity) = if culture_time > 0.0 {
        (biomass_final / culture_time, product_formed / culture_time)
    } else {
        (0.0, 0.0)
    };

    let mean_biomass = data.biomass.iter().sum::<f64>() / n as f64;
    let (specific_substrate_uptake, specific_product_formation) =
        if mean_biomass > 0.0 && culture_time > 0.0 {
            let scale = mean_biomass * culture_time;
            (substrate_consumed / scale, product_formed / scale)
        } else {
            (0.0, 0.0)
        };

    let intervals = classify_phases(&data.time, &data.biomass, &phase)?;

    debug!(
        label = %data.label,
        n,
        detected = phase.detected,
        mu = phase.growth_rate,
        "culture summarized"
    );

    Ok(CultureSummary {
        label: data.label.clone(),
        biomass_initial,
        biomass_final,
        biomass_max,
        substrate_consumed,
        product_formed,
        culture_time,
        doubling_time: phase.doubling_time(),
        phase,
        biomass_yield,
        product_yield,
        biomass_productivity,
        product_productivity,
        specific_substrate_uptake,
        specific_product_formation,
        intervals,
    })
}

/// Label each interval `[t[i-1], t[i]]` of a biomass series.
///
/// Intervals whose end lies inside a detected exponential window are labelled
/// `Exponential`; the rest are judged by the relative biomass change.
pub fn classify_phases(
    time: &[f64],
    biomass: &[f64],
    phase: &ExponentialPhaseResult,
) -> Result<Vec<IntervalPhase>, KineticsError> {
    if time.len() != biomass.len() {
        return Err(KineticsError::mismatch(
            "time",
            time.len(),
            "biomass",
            biomass.len(),
        ));
    }

    let mut out = Vec::with_capacity(time.len().saturating_sub(1));
    for i in 1..time.len() {
        let (t0, t1) = (time[i - 1], time[i]);
        let (x0, x1) = (biomass[i - 1], biomass[i]);
        let dt = t1 - t0;

        let specific_rate = if x0 > 0.0 && x1 > 0.0 && dt > 0.0 {
            (x1.ln() - x0.ln()) / dt
        } else {
            0.0
        };

        let label = if phase.contains(t1) {
            GrowthPhase::Exponential
        } else if x1 > x0 * (1.0 + GROWTH_RISE) {
            GrowthPhase::Growth
        } else if (x1 - x0).abs() / x0.max(1e-10) < STATIONARY_BAND {
            GrowthPhase::Stationary
        } else if x1 < x0 * (1.0 - DEATH_FALL) {
            GrowthPhase::Death
        } else {
            GrowthPhase::Transition
        };

        out.push(IntervalPhase {
            t_start: t0,
            t_end: t1,
            phase: label,
            specific_rate,
            biomass_change_pct: (x0 > 0.0).then(|| (x1 / x0 - 1.0) * 100.0),
        });
    }
    Ok(out)
}

/// Summarize independent experiments in parallel, preserving input order.
pub fn analyze_batch(
    experiments: &[Measurements],
    search: &PhaseSearch,
) -> Vec<Result<CultureSummary, KineticsError>> {
    experiments
        .par_iter()
        .map(|data| summarize_culture(data, search))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_culture() -> Measurements {
        let time: Vec<f64> = (0..=10).map(|i| i as f64).collect();
        let biomass = vec![0.1, 0.1, 0.2, 0.4, 0.8, 1.6, 3.2, 3.3, 3.3, 3.0, 2.5];
        let substrate = vec![20.0, 20.0, 19.5, 18.5, 16.0, 11.0, 2.0, 0.5, 0.0, 0.0, 0.0];
        let product = vec![0.0, 0.0, 0.1, 0.3, 0.7, 1.5, 3.0, 3.4, 3.5, 3.5, 3.5];
        Measurements {
            label: "batch-1".to_string(),
            time,
            biomass,
            substrate,
            product,
        }
    }

    #[test]
    fn summary_figures() {
        let data = batch_culture();
        let s = summarize_culture(&data, &PhaseSearch::default()).unwrap();

        assert_eq!(s.label, "batch-1");
        assert_eq!(s.biomass_max, 3.3);
        assert!((s.substrate_consumed - 20.0).abs() < 1e-12);
        assert!((s.product_formed - 3.5).abs() < 1e-12);
        assert!((s.culture_time - 10.0).abs() < 1e-12);
        assert!((s.biomass_yield - (2.5 - 0.1) / 20.0).abs() < 1e-12);
        assert!((s.product_yield - 3.5 / 20.0).abs() < 1e-12);
        assert!((s.biomass_productivity - 0.25).abs() < 1e-12);

        assert!(s.phase.detected);
        assert!((s.phase.growth_rate - std::f64::consts::LN_2).abs() < 1e-6);
        let td = s.doubling_time.unwrap();
        assert!((td - 1.0).abs() < 1e-5);

        let mean_x = data.biomass.iter().sum::<f64>() / 11.0;
        assert!((s.specific_substrate_uptake - 20.0 / (mean_x * 10.0)).abs() < 1e-12);
        assert_eq!(s.intervals.len(), 10);
    }

    #[test]
    fn no_consumption_gives_zero_yields() {
        let mut data = batch_culture();
        data.substrate = vec![5.0; 11];
        let s = summarize_culture(&data, &PhaseSearch::default()).unwrap();
        assert_eq!(s.biomass_yield, 0.0);
        assert_eq!(s.product_yield, 0.0);
    }

    #[test]
    fn phases_are_labelled() {
        let data = batch_culture();
        let phase =
            detect_exponential_phase_with(&data.time, &data.biomass, &PhaseSearch::default())
                .unwrap();
        let intervals = classify_phases(&data.time, &data.biomass, &phase).unwrap();

        // 0 -> 1: flat lag, no specific growth.
        assert_eq!(intervals[0].specific_rate, 0.0);
        assert_eq!(intervals[0].biomass_change_pct, Some(0.0));
        // 6 -> 7: +3 %.
        assert_eq!(intervals[6].phase, GrowthPhase::Transition);
        // 7 -> 8: flat.
        assert_eq!(intervals[7].phase, GrowthPhase::Stationary);
        // 9 -> 10: -17 %.
        assert_eq!(intervals[9].phase, GrowthPhase::Death);
        assert!(intervals.iter().any(|i| i.phase == GrowthPhase::Exponential));
        assert!(intervals[9].biomass_change_pct.unwrap() < -16.0);
    }

    #[test]
    fn mismatched_series_are_rejected() {
        let mut data = batch_culture();
        data.product.pop();
        assert!(matches!(
            summarize_culture(&data, &PhaseSearch::default()),
            Err(KineticsError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn batch_preserves_order() {
        let a = batch_culture();
        let mut b = batch_culture();
        b.label = "batch-2".to_string();
        b.biomass = vec![1.0; 11];
        let out = analyze_batch(&[a, b], &PhaseSearch::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().label, "batch-1");
        let second = out[1].as_ref().unwrap();
        assert_eq!(second.label, "batch-2");
        assert!(!second.phase.detected);
    }
}
