use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use super::error::SteadyStateError;
use super::labeled::LabeledArray;

/// Fraction of the peak core density a sample must exceed to count as steady state
pub const PLATEAU_FRACTION: f64 = 0.9;

/// Closed time interval [start_ms, end_ms] of steady-state plasma
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteadyStateWindow {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl SteadyStateWindow {
    pub fn new(start_ms: f64, end_ms: f64) -> Result<Self, SteadyStateError> {
        if !(start_ms <= end_ms) {
            return Err(SteadyStateError::InvalidWindow {
                start: start_ms,
                end: end_ms,
            });
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_ms && time <= self.end_ms
    }
}

/// Keep the time samples inside the window, optionally averaging over them.
pub fn select_fixed(
    field: &LabeledArray,
    window: &SteadyStateWindow,
    average: bool,
) -> Result<LabeledArray, SteadyStateError> {
    let selected = field.filter("time", |t| window.contains(t))?;
    if selected.size("time") == Some(0) {
        return Err(SteadyStateError::InvalidWindow {
            start: window.start_ms,
            end: window.end_ms,
        });
    }
    if average {
        Ok(selected.mean("time")?)
    } else {
        Ok(selected)
    }
}

/// Find the density plateau from the core-averaged density trace.
///
/// Only samples with |x| and |y| below `core_radius` contribute. The returned
/// pair is 1-based: the first and last time samples above 90% of the peak.
pub fn detect_auto(
    density: &LabeledArray,
    core_radius: f64,
) -> Result<(usize, usize), SteadyStateError> {
    let mut core = density.clone();
    for dim in ["x", "y"] {
        if core.has_dim(dim) {
            core = core.filter(dim, |v| v.abs() < core_radius)?;
            if core.size(dim) == Some(0) {
                return Err(SteadyStateError::EmptyCore(core_radius));
            }
        }
    }
    let others: Vec<String> = core
        .dims()
        .into_iter()
        .filter(|d| *d != "time")
        .map(String::from)
        .collect();
    let others: Vec<&str> = others.iter().map(String::as_str).collect();
    let trace = core.mean_over(&others)?;
    trace.axis_of("time")?;

    let peak = *trace.data().max_skipnan();
    if !(peak > 0.0) {
        return Err(SteadyStateError::NoPlateau);
    }
    let threshold = PLATEAU_FRACTION * peak;

    let start = trace
        .data()
        .iter()
        .position(|v| *v > threshold)
        .ok_or(SteadyStateError::NoPlateau)?;
    let end = trace
        .data()
        .iter()
        .collect::<Vec<_>>()
        .into_iter()
        .rposition(|v| *v > threshold)
        .ok_or(SteadyStateError::NoPlateau)?;
    Ok((start + 1, end + 1))
}

/// [`detect_auto`] mapped onto the density's time coordinate
pub fn detect_window(
    density: &LabeledArray,
    core_radius: f64,
) -> Result<SteadyStateWindow, SteadyStateError> {
    let (start, end) = detect_auto(density, core_radius)?;
    let time = &density.coord("time")?.values;
    let window = SteadyStateWindow::new(time[start - 1], time[end - 1])?;
    spdlog::info!(
        "Detected steady state from {} ms to {} ms (samples {} through {})",
        window.start_ms,
        window.end_ms,
        start,
        end
    );
    Ok(window)
}

/// Where the steady-state window comes from
#[derive(Debug, Clone)]
pub enum WindowSource<'a> {
    Fixed(SteadyStateWindow),
    Auto {
        density: &'a LabeledArray,
        core_radius: f64,
    },
}

impl WindowSource<'_> {
    pub fn resolve(&self) -> Result<SteadyStateWindow, SteadyStateError> {
        match self {
            Self::Fixed(window) => Ok(*window),
            Self::Auto {
                density,
                core_radius,
            } => detect_window(density, *core_radius),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeled::Coordinate;
    use ndarray::{ArrayD, IxDyn};

    /// x, time density with value 10 on time indices 5..=19 inside the core
    fn density() -> LabeledArray {
        let x: Vec<f64> = vec![-40.0, -10.0, 0.0, 10.0, 40.0];
        let data = ArrayD::from_shape_fn(IxDyn(&[5, 30]), |idx| {
            let core = x[idx[0]].abs() < 26.0;
            match (core, idx[1]) {
                (true, 5..=19) => 10.0,
                (true, _) => 1.0,
                (false, _) => 100.0,
            }
        });
        LabeledArray::new(
            "n_e",
            data,
            vec![
                Coordinate::new("x", x),
                Coordinate::new("time", (0..30).map(|t| t as f64 * 0.5).collect()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_detect_auto() {
        assert_eq!(detect_auto(&density(), 26.0), Ok((6, 20)));
    }

    #[test]
    fn test_detect_skips_missing_density() {
        let mut gappy = density();
        // every core sample at time index 0 and 12 is missing
        gappy
            .data_mut()
            .indexed_iter_mut()
            .filter(|(idx, _)| matches!(idx[0], 1..=3) && matches!(idx[1], 0 | 12))
            .for_each(|(_, v)| *v = f64::NAN);
        assert_eq!(detect_auto(&gappy, 26.0), Ok((6, 20)));

        let empty = density().map(|_| f64::NAN);
        assert_eq!(detect_auto(&empty, 26.0), Err(SteadyStateError::NoPlateau));
    }

    #[test]
    fn test_detect_window_times() {
        let window = detect_window(&density(), 26.0).unwrap();
        assert_eq!(window, SteadyStateWindow::new(2.5, 9.5).unwrap());
    }

    #[test]
    fn test_detect_empty_core() {
        // x = 0 alone lies inside a 5 cm core
        assert_eq!(detect_auto(&density(), 5.0), Ok((6, 20)));
        assert_eq!(
            detect_auto(&density().filter("x", |x| x.abs() > 20.0).unwrap(), 26.0),
            Err(SteadyStateError::EmptyCore(26.0))
        );
    }

    #[test]
    fn test_select_fixed() {
        let window = SteadyStateWindow::new(2.5, 9.5).unwrap();
        let field = density();
        let selected = select_fixed(&field, &window, false).unwrap();
        assert_eq!(selected.size("time"), Some(15));
        let averaged = select_fixed(&field, &window, true).unwrap();
        assert_eq!(averaged.dims(), vec!["x"]);
        assert_eq!(averaged.data()[[2]], 10.0);
        assert_eq!(averaged.data()[[0]], 100.0);
    }

    #[test]
    fn test_window_validation() {
        assert!(SteadyStateWindow::new(5.0, 1.0).is_err());
        let outside = SteadyStateWindow::new(100.0, 200.0).unwrap();
        assert!(select_fixed(&density(), &outside, true).is_err());
    }

    #[test]
    fn test_window_source() {
        let field = density();
        let fixed = SteadyStateWindow::new(1.0, 2.0).unwrap();
        assert_eq!(WindowSource::Fixed(fixed).resolve(), Ok(fixed));
        let auto = WindowSource::Auto {
            density: &field,
            core_radius: 26.0,
        };
        assert_eq!(auto.resolve().unwrap().start_ms, 2.5);
    }
}
