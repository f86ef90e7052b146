use chrono::NaiveDate;

use crate::series::TimeSeries;

/// Volatility regime label. Thresholds are fixed: below the 33rd
/// percentile is Low, below the 67th is Medium, the rest is High.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Low,
    Medium,
    High,
}

impl Regime {
    pub fn from_percentile(percentile: f64) -> Self {
        if percentile < 33.0 {
            Regime::Low
        } else if percentile < 67.0 {
            Regime::Medium
        } else {
            Regime::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Low => "Low",
            Regime::Medium => "Medium",
            Regime::High => "High",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Low" => Some(Regime::Low),
            "Medium" => Some(Regime::Medium),
            "High" => Some(Regime::High),
            _ => None,
        }
    }
}

/// One classified observation, keyed by date.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeRow {
    pub date: NaiveDate,
    pub realised_volatility: f64,
    pub percentile_rank: f64,
    pub regime: Regime,
}

/// Percentile rank of every value relative to the full slice, on a 0-100
/// scale. Ties receive the average of their rank positions, so an all-equal
/// slice ranks every element at the same midpoint.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).expect("non-finite value"));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; a tie group gets the average of its positions.
        let avg_rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    ranks.iter().map(|r| r / n as f64 * 100.0).collect()
}

/// Label every observation of a realised-volatility series.
///
/// Classification of a single point depends on the whole distribution, so
/// this is a batch operation over the full series.
pub fn classify_regimes(realised_vol: &TimeSeries) -> Vec<RegimeRow> {
    let values: Vec<f64> = realised_vol.values().collect();
    let percentiles = percentile_ranks(&values);

    realised_vol
        .iter()
        .zip(percentiles)
        .map(|(&(date, value), percentile)| RegimeRow {
            date,
            realised_volatility: value,
            percentile_rank: percentile,
            regime: Regime::from_percentile(percentile),
        })
        .collect()
}
