use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::AppError;

/// A daily-indexed numeric series. Dates are strictly increasing with no
/// duplicates; transformations produce new series rather than mutating.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    points: Vec<(NaiveDate, f64)>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Build a series from unordered pairs. Input is sorted by date;
    /// duplicate dates are rejected.
    pub fn from_pairs(mut pairs: Vec<(NaiveDate, f64)>) -> Result<Self, AppError> {
        pairs.sort_by_key(|(date, _)| *date);
        for window in pairs.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(AppError::Series(format!(
                    "duplicate date {} in series",
                    window[0].0
                )));
            }
        }
        Ok(Self { points: pairs })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(NaiveDate, f64)> {
        self.points.iter()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|(date, _)| *date)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|(_, value)| *value)
    }

    pub fn first(&self) -> Option<&(NaiveDate, f64)> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&(NaiveDate, f64)> {
        self.points.last()
    }

    /// Look up the value at an exact date.
    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |(d, _)| *d)
            .ok()
            .map(|idx| self.points[idx].1)
    }

    /// Inner-join two series on date. Unmatched points on either side are
    /// discarded. Output is ordered by date.
    pub fn inner_join(&self, other: &Self) -> Vec<(NaiveDate, f64, f64)> {
        let mut joined = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.points.len() && j < other.points.len() {
            let (da, va) = self.points[i];
            let (db, vb) = other.points[j];
            match da.cmp(&db) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    joined.push((da, va, vb));
                    i += 1;
                    j += 1;
                }
            }
        }
        joined
    }
}

/// Restrict every series to the timestamps common to all of them.
///
/// Output preserves input order, every series ends up with an identical
/// ascending date sequence, and an empty intersection yields empty series
/// rather than an error.
pub fn align_series(series: &[TimeSeries]) -> Vec<TimeSeries> {
    let Some(first) = series.first() else {
        return Vec::new();
    };

    let mut common: HashSet<NaiveDate> = first.dates().collect();
    for s in &series[1..] {
        let dates: HashSet<NaiveDate> = s.dates().collect();
        common.retain(|d| dates.contains(d));
    }

    series
        .iter()
        .map(|s| TimeSeries {
            points: s
                .points
                .iter()
                .filter(|(date, _)| common.contains(date))
                .copied()
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(days: &[(u32, f64)]) -> TimeSeries {
        TimeSeries::from_pairs(days.iter().map(|&(day, v)| (d(day), v)).collect()).unwrap()
    }

    #[test]
    fn from_pairs_sorts_input() {
        let s = series(&[(3, 30.0), (1, 10.0), (2, 20.0)]);
        let dates: Vec<NaiveDate> = s.dates().collect();
        assert_eq!(dates, vec![d(1), d(2), d(3)]);
    }

    #[test]
    fn from_pairs_rejects_duplicate_dates() {
        let result = TimeSeries::from_pairs(vec![(d(1), 1.0), (d(1), 2.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn inner_join_keeps_only_shared_dates() {
        let a = series(&[(1, 1.0), (2, 2.0), (4, 4.0)]);
        let b = series(&[(2, 20.0), (3, 30.0), (4, 40.0)]);
        let joined = a.inner_join(&b);
        assert_eq!(joined, vec![(d(2), 2.0, 20.0), (d(4), 4.0, 40.0)]);
    }

    #[test]
    fn align_restricts_to_common_dates_in_input_order() {
        let a = series(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        let b = series(&[(2, 20.0), (3, 30.0), (4, 40.0)]);
        let c = series(&[(3, 300.0), (2, 200.0), (5, 500.0)]);

        let aligned = align_series(&[a, b, c]);
        assert_eq!(aligned.len(), 3);
        for s in &aligned {
            let dates: Vec<NaiveDate> = s.dates().collect();
            assert_eq!(dates, vec![d(2), d(3)]);
        }
        assert_eq!(aligned[0].values().collect::<Vec<_>>(), vec![2.0, 3.0]);
        assert_eq!(aligned[2].values().collect::<Vec<_>>(), vec![200.0, 300.0]);
    }

    #[test]
    fn align_with_itself_is_a_noop() {
        let a = series(&[(1, 1.0), (2, 2.0)]);
        let aligned = align_series(&[a.clone(), a.clone()]);
        assert_eq!(aligned[0], a);
        assert_eq!(aligned[1], a);
    }

    #[test]
    fn align_empty_intersection_yields_empty_series() {
        let a = series(&[(1, 1.0)]);
        let b = series(&[(2, 2.0)]);
        let aligned = align_series(&[a, b]);
        assert!(aligned.iter().all(TimeSeries::is_empty));
    }

    #[test]
    fn value_at_exact_date() {
        let s = series(&[(1, 1.5), (3, 3.5)]);
        assert_eq!(s.value_at(d(3)), Some(3.5));
        assert_eq!(s.value_at(d(2)), None);
    }
}
