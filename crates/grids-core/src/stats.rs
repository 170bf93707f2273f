//! Summary statistics of the data cells of a grid.
//!
//! [`Stats`] holds the figures and the bookkeeping for keeping them current.
//! The grid decides when a full rescan is needed and drives it through
//! [`Stats::reset`] and [`Stats::accumulate`].

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::value::GridValue;

/// When statistics are brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsMode {
    /// Updated on every cell write.
    #[default]
    Eager,
    /// Marked stale on write and recomputed when read.
    Lazy,
}

impl fmt::Display for StatsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsMode::Eager => f.write_str("eager"),
            StatsMode::Lazy => f.write_str("lazy"),
        }
    }
}

impl FromStr for StatsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(StatsMode::Eager),
            "lazy" => Ok(StatsMode::Lazy),
            other => Err(format!("unknown stats mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Stats<T: GridValue> {
    mode: StatsMode,
    no_data: T,
    n: u64,
    sum: BigDecimal,
    min: Option<T>,
    n_min: u64,
    max: Option<T>,
    n_max: u64,
    stale: bool,
    min_stale: bool,
    max_stale: bool,
}

impl<T: GridValue> Stats<T> {
    pub fn new(mode: StatsMode, no_data: T) -> Self {
        Self {
            mode,
            no_data,
            n: 0,
            sum: BigDecimal::from(0),
            min: None,
            n_min: 0,
            max: None,
            n_max: 0,
            stale: false,
            min_stale: false,
            max_stale: false,
        }
    }

    pub fn mode(&self) -> StatsMode {
        self.mode
    }

    pub fn no_data(&self) -> T {
        self.no_data
    }

    /// Number of data cells as of the last update.
    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn sum(&self) -> &BigDecimal {
        &self.sum
    }

    pub fn min(&self) -> Option<T> {
        self.min
    }

    pub fn max(&self) -> Option<T> {
        self.max
    }

    /// Cells holding the minimum.
    pub fn n_min(&self) -> u64 {
        self.n_min
    }

    /// Cells holding the maximum.
    pub fn n_max(&self) -> u64 {
        self.n_max
    }

    /// Arithmetic mean of the data cells.
    pub fn mean(&self) -> Option<BigDecimal> {
        (self.n > 0).then(|| &self.sum / BigDecimal::from(self.n))
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Whether count and sum must be rescanned before they are read.
    pub fn needs_count_scan(&self) -> bool {
        self.stale
    }

    /// Whether the minimum must be rescanned before it is read.
    pub fn needs_min_scan(&self, force: bool) -> bool {
        force || (self.mode == StatsMode::Eager && self.min_stale)
    }

    /// Whether the maximum must be rescanned before it is read.
    pub fn needs_max_scan(&self, force: bool) -> bool {
        force || (self.mode == StatsMode::Eager && self.max_stale)
    }

    /// Clear all figures ahead of a full scan.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode, self.no_data);
    }

    /// Fold `count` cells holding `value` into the figures.
    pub fn accumulate(&mut self, value: T, count: u64) {
        if value == self.no_data || count == 0 {
            return;
        }
        self.n += count;
        self.sum += value.to_decimal() * BigDecimal::from(count);
        match self.min {
            Some(min) if value > min => {}
            Some(min) if value == min => self.n_min += count,
            _ => {
                self.min = Some(value);
                self.n_min = count;
            }
        }
        match self.max {
            Some(max) if value < max => {}
            Some(max) if value == max => self.n_max += count,
            _ => {
                self.max = Some(value);
                self.n_max = count;
            }
        }
    }

    /// Record that one cell changed from `previous` to `value`.
    pub fn record_change(&mut self, value: T, previous: T) {
        if self.mode == StatsMode::Lazy {
            if value != previous {
                self.stale = true;
            }
            return;
        }
        if previous != self.no_data {
            self.remove(previous);
        }
        if value != self.no_data {
            self.add(value);
        }
    }

    fn remove(&mut self, value: T) {
        self.n = self.n.saturating_sub(1);
        self.sum -= value.to_decimal();
        if self.n == 0 {
            self.reset();
            return;
        }
        if self.min == Some(value) && !self.min_stale {
            self.n_min -= 1;
            self.min_stale = self.n_min == 0;
        }
        if self.max == Some(value) && !self.max_stale {
            self.n_max -= 1;
            self.max_stale = self.n_max == 0;
        }
    }

    fn add(&mut self, value: T) {
        self.n += 1;
        self.sum += value.to_decimal();
        match self.min {
            Some(min) if value > min => {}
            Some(min) if value == min => {
                // A stale minimum with no cells left is still a lower bound.
                self.n_min = if self.min_stale { 1 } else { self.n_min + 1 };
                self.min_stale = false;
            }
            _ => {
                self.min = Some(value);
                self.n_min = 1;
                self.min_stale = false;
            }
        }
        match self.max {
            Some(max) if value < max => {}
            Some(max) if value == max => {
                self.n_max = if self.max_stale { 1 } else { self.n_max + 1 };
                self.max_stale = false;
            }
            _ => {
                self.max = Some(value);
                self.n_max = 1;
                self.max_stale = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ND: f64 = -f64::MAX;

    fn scanned(values: &[f64]) -> Stats<f64> {
        let mut stats = Stats::new(StatsMode::Eager, ND);
        for v in values {
            stats.accumulate(*v, 1);
        }
        stats
    }

    #[test]
    fn test_single_value() {
        let mut stats = Stats::new(StatsMode::Eager, ND);
        stats.record_change(3.0, ND);
        assert_eq!(stats.n(), 1);
        assert_eq!(stats.sum(), &BigDecimal::from(3));
        assert_eq!(stats.min(), Some(3.0));
        assert_eq!(stats.max(), Some(3.0));
        assert!(!stats.needs_min_scan(false));
    }

    #[test]
    fn test_eager_matches_scan() {
        let mut cells = vec![ND; 10];
        let mut stats = Stats::new(StatsMode::Eager, ND);
        let writes = [(0, 4.0), (3, -2.0), (0, 1.0), (7, 4.0), (3, ND), (9, 1.0)];
        for (i, v) in writes {
            let previous = std::mem::replace(&mut cells[i], v);
            stats.record_change(v, previous);
        }
        let expected = scanned(&cells);
        assert_eq!(stats.n(), expected.n());
        assert_eq!(stats.sum(), expected.sum());
        assert_eq!(stats.max(), Some(4.0));
        assert_eq!(stats.n_max(), 1);
        // -2.0 was the only minimum and has gone.
        assert!(stats.needs_min_scan(false));
        assert_eq!(expected.min(), Some(1.0));
        assert_eq!(expected.n_min(), 2);
    }

    #[test]
    fn test_removing_last_extremum_marks_stale() {
        let mut stats = scanned(&[1.0, 5.0, 3.0]);
        stats.record_change(ND, 1.0);
        assert!(stats.needs_min_scan(false));
        assert!(!stats.needs_max_scan(false));
        stats.record_change(0.5, ND);
        assert!(!stats.needs_min_scan(false));
        assert_eq!(stats.min(), Some(0.5));
    }

    #[test]
    fn test_stale_extremum_restored_by_equal_value() {
        let mut stats = scanned(&[1.0, 5.0]);
        stats.record_change(ND, 5.0);
        assert!(stats.needs_max_scan(false));
        stats.record_change(5.0, ND);
        assert!(!stats.needs_max_scan(false));
        assert_eq!(stats.n_max(), 1);
    }

    #[test]
    fn test_removing_all_data_resets() {
        let mut stats = scanned(&[2.0]);
        stats.record_change(ND, 2.0);
        assert_eq!(stats.n(), 0);
        assert_eq!(stats.min(), None);
        assert_eq!(stats.sum(), &BigDecimal::from(0));
    }

    #[test]
    fn test_lazy_marks_stale() {
        let mut stats = Stats::new(StatsMode::Lazy, 0);
        assert!(!stats.needs_count_scan());
        stats.record_change(4, 0);
        assert!(stats.needs_count_scan());
        assert_eq!(stats.n(), 0);
        assert!(!stats.needs_min_scan(false));
        assert!(stats.needs_min_scan(true));
        stats.reset();
        stats.accumulate(4, 1);
        assert!(!stats.needs_count_scan());
        assert_eq!(stats.n(), 1);
    }

    #[test]
    fn test_boolean_counts_true_cells() {
        let mut stats = Stats::new(StatsMode::Eager, false);
        stats.accumulate(true, 6);
        stats.accumulate(false, 10);
        assert_eq!(stats.n(), 6);
        assert_eq!(stats.sum(), &BigDecimal::from(6));
    }

    #[test]
    fn test_mean() {
        let stats = scanned(&[1.0, 2.0, ND]);
        assert_eq!(stats.mean(), Some("1.5".parse::<BigDecimal>().unwrap()));
        assert_eq!(Stats::new(StatsMode::Eager, ND).mean(), None);
    }
}
