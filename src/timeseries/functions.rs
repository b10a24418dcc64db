use serde::Serializer;

/// Points in the rolling window used for local variability.
pub const ROLLING_WINDOW: usize = 3;
/// Fewest points a rolling window may hold and still produce a value.
pub const ROLLING_MIN_PERIODS: usize = 2;

/// Dispersion and change statistics of one signal within one admission.
///
/// Values are unrounded; rounding belongs to serialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub sudden_change_count: usize,
    pub max_rolling_std: Option<f64>,
}

impl SignalStatistics {
    /// Statistics over chronologically ordered values. `None` below two values.
    pub fn compute(values: &[f64], sudden_change_magnitude: f64) -> Option<Self> {
        let std_dev = TimeSeriesFunctions::sample_std_dev(values)?;
        let mean = TimeSeriesFunctions::mean(values)?;

        Some(SignalStatistics {
            mean,
            std_dev,
            coefficient_of_variation: TimeSeriesFunctions::coefficient_of_variation(std_dev, mean),
            sudden_change_count: TimeSeriesFunctions::count_sudden_changes(values, sudden_change_magnitude),
            max_rolling_std: TimeSeriesFunctions::max_rolling_std(values, ROLLING_WINDOW, ROLLING_MIN_PERIODS),
        })
    }
}

/// Collection of time series functions
pub struct TimeSeriesFunctions;

impl TimeSeriesFunctions {
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Sample standard deviation (n - 1 denominator).
    pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
        if values.len() < 2 {
            return None;
        }
        let mean = Self::mean(values)?;
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        Some(variance.sqrt())
    }

    /// `std_dev / mean`, or 0 when the mean is 0.
    pub fn coefficient_of_variation(std_dev: f64, mean: f64) -> f64 {
        if mean == 0.0 {
            0.0
        } else {
            std_dev / mean
        }
    }

    /// Consecutive pairs whose absolute difference exceeds `magnitude`.
    pub fn count_sudden_changes(values: &[f64], magnitude: f64) -> usize {
        values
            .windows(2)
            .filter(|pair| (pair[1] - pair[0]).abs() > magnitude)
            .count()
    }

    /// Largest sample standard deviation over trailing windows of `window` points.
    ///
    /// The window ending at index `i` covers `values[i + 1 - window..=i]`, truncated at the
    /// start of the series, and only counts when it holds at least `min_periods` points.
    pub fn max_rolling_std(values: &[f64], window: usize, min_periods: usize) -> Option<f64> {
        let min_periods = min_periods.max(2);
        (0..values.len())
            .filter_map(|end| {
                let start = (end + 1).saturating_sub(window);
                let slice = &values[start..=end];
                if slice.len() < min_periods {
                    return None;
                }
                Self::sample_std_dev(slice)
            })
            .fold(None, |max: Option<f64>, std| Some(max.map_or(std, |m| m.max(std))))
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub(crate) fn serialize_round_2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 2))
}

pub(crate) fn serialize_round_3<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 3))
}

pub(crate) fn serialize_round_2_opt<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_some(&round_to(*v, 2)),
        None => serializer.serialize_none(),
    }
}
