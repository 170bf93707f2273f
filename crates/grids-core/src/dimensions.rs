//! Real-world extent of a grid.
//!
//! Coordinates are held as arbitrary-precision decimals so that mapping
//! `x`/`y` to columns/rows stays exact for grids with millions of cells.
//! Row 0 is the bottom row (smallest `y`) and column 0 the leftmost.

use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    xmin: BigDecimal,
    ymin: BigDecimal,
    xmax: BigDecimal,
    ymax: BigDecimal,
    cellsize: BigDecimal,
}

impl Dimensions {
    pub fn new(
        xmin: BigDecimal,
        ymin: BigDecimal,
        xmax: BigDecimal,
        ymax: BigDecimal,
        cellsize: BigDecimal,
    ) -> GridResult<Self> {
        if xmax <= xmin || ymax <= ymin {
            return Err(GridError::InvalidDimensions(format!(
                "empty extent x [{}, {}) y [{}, {})",
                xmin, xmax, ymin, ymax
            )));
        }
        if cellsize <= BigDecimal::from(0) {
            return Err(GridError::InvalidDimensions(format!(
                "cellsize must be positive, got {}",
                cellsize
            )));
        }
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
            cellsize,
        })
    }

    /// Extent of an `nrows x ncols` grid whose lower-left corner is `(xmin, ymin)`.
    pub fn from_origin(
        xmin: BigDecimal,
        ymin: BigDecimal,
        cellsize: BigDecimal,
        nrows: i64,
        ncols: i64,
    ) -> GridResult<Self> {
        let xmax = &xmin + &cellsize * BigDecimal::from(ncols);
        let ymax = &ymin + &cellsize * BigDecimal::from(nrows);
        Self::new(xmin, ymin, xmax, ymax, cellsize)
    }

    /// Unit cells with the origin at zero.
    pub fn unit(nrows: i64, ncols: i64) -> GridResult<Self> {
        Self::from_origin(
            BigDecimal::from(0),
            BigDecimal::from(0),
            BigDecimal::from(1),
            nrows,
            ncols,
        )
    }

    pub fn xmin(&self) -> &BigDecimal {
        &self.xmin
    }

    pub fn ymin(&self) -> &BigDecimal {
        &self.ymin
    }

    pub fn xmax(&self) -> &BigDecimal {
        &self.xmax
    }

    pub fn ymax(&self) -> &BigDecimal {
        &self.ymax
    }

    pub fn cellsize(&self) -> &BigDecimal {
        &self.cellsize
    }

    pub fn width(&self) -> BigDecimal {
        &self.xmax - &self.xmin
    }

    pub fn height(&self) -> BigDecimal {
        &self.ymax - &self.ymin
    }

    pub fn col_of_x(&self, x: &BigDecimal) -> i64 {
        floor_i64(&((x - &self.xmin) / &self.cellsize))
    }

    pub fn row_of_y(&self, y: &BigDecimal) -> i64 {
        floor_i64(&((y - &self.ymin) / &self.cellsize))
    }

    /// x-coordinate of the centre of column `col`.
    pub fn cell_x(&self, col: i64) -> BigDecimal {
        &self.xmin + &self.cellsize * BigDecimal::from(col) + self.half_cell()
    }

    /// y-coordinate of the centre of row `row`.
    pub fn cell_y(&self, row: i64) -> BigDecimal {
        &self.ymin + &self.cellsize * BigDecimal::from(row) + self.half_cell()
    }

    /// `[xmin, ymin, xmax, ymax]` of one cell.
    pub fn cell_bounds(&self, row: i64, col: i64) -> [BigDecimal; 4] {
        let x0 = &self.xmin + &self.cellsize * BigDecimal::from(col);
        let y0 = &self.ymin + &self.cellsize * BigDecimal::from(row);
        let x1 = &x0 + &self.cellsize;
        let y1 = &y0 + &self.cellsize;
        [x0, y0, x1, y1]
    }

    /// Half-open containment: left and bottom edges are inside, right and top are not.
    pub fn contains(&self, x: &BigDecimal, y: &BigDecimal) -> bool {
        x >= &self.xmin && x < &self.xmax && y >= &self.ymin && y < &self.ymax
    }

    /// A real-world distance expressed in cells.
    pub fn cell_distance(&self, distance: &BigDecimal) -> BigDecimal {
        distance / &self.cellsize
    }

    pub fn cellsize_f64(&self) -> f64 {
        self.cellsize.to_f64().unwrap_or(f64::NAN)
    }

    fn half_cell(&self) -> BigDecimal {
        &self.cellsize / BigDecimal::from(2)
    }
}

/// Exact decimal form of a floating point coordinate.
pub fn decimal(value: f64) -> BigDecimal {
    BigDecimal::from_f64(value).unwrap_or_default()
}

fn floor_i64(value: &BigDecimal) -> i64 {
    let floored = value.with_scale_round(0, RoundingMode::Floor);
    floored.to_i64().unwrap_or(if floored < BigDecimal::from(0) {
        i64::MIN
    } else {
        i64::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_unit_dimensions() {
        let dims = Dimensions::unit(512, 100).unwrap();
        assert_eq!(dims.height(), BigDecimal::from(512));
        assert_eq!(dims.width(), BigDecimal::from(100));
        assert_eq!(dims.cell_x(0), d("0.5"));
        assert_eq!(dims.cell_y(0), d("0.5"));
    }

    #[test]
    fn test_col_of_x_floors() {
        let dims = Dimensions::unit(1000, 5120).unwrap();
        assert_eq!(dims.col_of_x(&d("0.5")), 0);
        assert_eq!(dims.col_of_x(&d("5120.5")), 5120);
        assert_eq!(dims.col_of_x(&d("-0.5")), -1);
        assert_eq!(dims.col_of_x(&d("5119.999999999999999999999999999")), 5119);
        assert_eq!(dims.row_of_y(&d("-0.000000000000000000000000000001")), -1);
        assert_eq!(dims.row_of_y(&d("0")), 0);
    }

    #[test]
    fn test_half_open_extent() {
        let dims = Dimensions::unit(1, 1).unwrap();
        assert!(dims.contains(&d("0"), &d("0")));
        assert!(dims.contains(&d("0.000000000000000000000000000000000001"), &d("0.5")));
        assert!(!dims.contains(&d("1"), &d("0.5")));
        assert!(!dims.contains(&d("0.5"), &d("1")));
    }

    #[test]
    fn test_cell_bounds() {
        let dims = Dimensions::unit(1, 1).unwrap();
        let bounds = dims.cell_bounds(0, 0);
        assert_eq!(bounds[0], BigDecimal::from(0));
        assert_eq!(bounds[1], BigDecimal::from(0));
        assert_eq!(bounds[2], BigDecimal::from(1));
        assert_eq!(bounds[3], BigDecimal::from(1));
    }

    #[test]
    fn test_cell_distance() {
        let dims = Dimensions::new(d("0"), d("0"), d("1"), d("1"), d("0.1")).unwrap();
        assert_eq!(dims.cell_distance(&BigDecimal::from(10)), BigDecimal::from(100));
        let unit = Dimensions::unit(10, 10).unwrap();
        assert_eq!(unit.cell_distance(&BigDecimal::from(10)), BigDecimal::from(10));
    }

    #[test]
    fn test_rejects_degenerate_extent() {
        assert!(Dimensions::new(d("1"), d("0"), d("1"), d("1"), d("1")).is_err());
        assert!(Dimensions::new(d("0"), d("0"), d("1"), d("1"), d("0")).is_err());
    }

    #[test]
    fn test_from_origin() {
        let dims = Dimensions::from_origin(d("100"), d("-50"), d("2.5"), 4, 8).unwrap();
        assert_eq!(dims.xmax(), &d("120"));
        assert_eq!(dims.ymax(), &d("-40"));
        assert_eq!(dims.col_of_x(&d("102.5")), 1);
        assert_eq!(dims.row_of_y(&d("-47.6")), 0);
    }
}
