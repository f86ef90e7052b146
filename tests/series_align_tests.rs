use std::collections::HashSet;

use chrono::NaiveDate;

use vol_eval::series::{align_series, TimeSeries};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn series(days: &[u32]) -> TimeSeries {
    TimeSeries::from_pairs(days.iter().map(|&day| (d(day), day as f64)).collect()).unwrap()
}

#[test]
/// Aligned outputs must share a pairwise-identical date sequence equal to
/// the intersection of the inputs' date sets.
fn aligned_dates_equal_the_intersection() {
    let a = series(&[1, 2, 3, 5, 8]);
    let b = series(&[2, 3, 4, 5, 9]);
    let c = series(&[1, 2, 5, 8, 9]);

    let expected: HashSet<NaiveDate> = {
        let sa: HashSet<_> = a.dates().collect();
        let sb: HashSet<_> = b.dates().collect();
        let sc: HashSet<_> = c.dates().collect();
        sa.intersection(&sb)
            .copied()
            .collect::<HashSet<_>>()
            .intersection(&sc)
            .copied()
            .collect()
    };

    let aligned = align_series(&[a, b, c]);
    assert_eq!(aligned.len(), 3);

    let first_dates: Vec<NaiveDate> = aligned[0].dates().collect();
    assert_eq!(
        first_dates.iter().copied().collect::<HashSet<_>>(),
        expected
    );
    for s in &aligned[1..] {
        assert_eq!(s.dates().collect::<Vec<_>>(), first_dates);
    }

    // Strictly ascending.
    for window in first_dates.windows(2) {
        assert!(window[0] < window[1]);
    }
}

#[test]
fn aligning_a_series_with_itself_is_a_noop() {
    let a = series(&[1, 3, 7]);
    let aligned = align_series(&[a.clone()]);
    assert_eq!(aligned, vec![a]);
}

#[test]
fn values_follow_their_own_series_after_alignment() {
    let a = TimeSeries::from_pairs(vec![(d(1), 10.0), (d(2), 20.0)]).unwrap();
    let b = TimeSeries::from_pairs(vec![(d(2), 200.0), (d(3), 300.0)]).unwrap();

    let aligned = align_series(&[a, b]);
    assert_eq!(aligned[0].values().collect::<Vec<_>>(), vec![20.0]);
    assert_eq!(aligned[1].values().collect::<Vec<_>>(), vec![200.0]);
}

#[test]
fn disjoint_inputs_yield_empty_series_not_an_error() {
    let aligned = align_series(&[series(&[1, 2]), series(&[3, 4])]);
    assert_eq!(aligned.len(), 2);
    assert!(aligned.iter().all(TimeSeries::is_empty));
}
