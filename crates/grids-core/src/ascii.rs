//! ESRI ASCII grids.
//!
//! ```text
//! ncols         4
//! nrows         3
//! xllcorner     100.0
//! yllcorner     200.0
//! cellsize      10
//! NODATA_value  -9999
//! 1 2 3 4
//! ...
//! ```
//!
//! Values run row by row from the top of the grid, so the first value is
//! the cell at row `nrows - 1`, column 0. `xllcenter`/`yllcenter` may be
//! given instead of the corner keys; `NODATA_value` is optional.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::cache::ChunkCache;
use crate::dimensions::Dimensions;
use crate::error::{GridError, GridResult};
use crate::grid::Grid;
use crate::value::GridValue;

/// Shape, extent and no-data value announced by a row-major source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceHeader {
    pub nrows: i64,
    pub ncols: i64,
    pub dimensions: Dimensions,
    pub no_data: Option<f64>,
}

/// A stream of cell values, top row first and left to right within a row.
///
/// Sources are consumed once: importing takes the source by value.
pub trait RowMajorSource {
    fn header(&self) -> &SourceHeader;

    /// The next value; an error once the stream is exhausted.
    fn next_value(&mut self) -> GridResult<f64>;
}

/// Streaming reader of an ESRI ASCII grid.
pub struct AsciiGridReader<R> {
    reader: R,
    header: SourceHeader,
    pending: VecDeque<String>,
}

impl AsciiGridReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> GridResult<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: BufRead> AsciiGridReader<R> {
    /// Parse the header, leaving the reader positioned at the first value.
    pub fn new(mut reader: R) -> GridResult<Self> {
        let mut ncols: Option<i64> = None;
        let mut nrows: Option<i64> = None;
        let mut x: Option<(BigDecimal, bool)> = None;
        let mut y: Option<(BigDecimal, bool)> = None;
        let mut cellsize: Option<BigDecimal> = None;
        let mut no_data: Option<f64> = None;
        let mut pending = VecDeque::new();

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let value = tokens.next();
            match key.to_ascii_lowercase().as_str() {
                "ncols" => ncols = Some(parse(key, value)?),
                "nrows" => nrows = Some(parse(key, value)?),
                "xllcorner" => x = Some((parse(key, value)?, false)),
                "xllcenter" => x = Some((parse(key, value)?, true)),
                "yllcorner" => y = Some((parse(key, value)?, false)),
                "yllcenter" => y = Some((parse(key, value)?, true)),
                "cellsize" => cellsize = Some(parse(key, value)?),
                "nodata_value" => no_data = Some(parse(key, value)?),
                _ => {
                    pending.extend(line.split_whitespace().map(str::to_string));
                    break;
                }
            }
        }

        let ncols = ncols.ok_or_else(|| missing("ncols"))?;
        let nrows = nrows.ok_or_else(|| missing("nrows"))?;
        let cellsize = cellsize.ok_or_else(|| missing("cellsize"))?;
        let (x, x_centre) = x.ok_or_else(|| missing("xllcorner"))?;
        let (y, y_centre) = y.ok_or_else(|| missing("yllcorner"))?;
        let half = &cellsize / BigDecimal::from(2);
        let xmin = if x_centre { x - &half } else { x };
        let ymin = if y_centre { y - &half } else { y };
        let dimensions = Dimensions::from_origin(xmin, ymin, cellsize, nrows, ncols)?;

        Ok(Self {
            reader,
            header: SourceHeader {
                nrows,
                ncols,
                dimensions,
                no_data,
            },
            pending,
        })
    }
}

impl<R: BufRead> RowMajorSource for AsciiGridReader<R> {
    fn header(&self) -> &SourceHeader {
        &self.header
    }

    fn next_value(&mut self) -> GridResult<f64> {
        let mut line = String::new();
        while self.pending.is_empty() {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(GridError::Format("ASCII grid ended early".to_string()));
            }
            self.pending.extend(line.split_whitespace().map(str::to_string));
        }
        match self.pending.pop_front() {
            Some(token) => token
                .parse()
                .map_err(|_| GridError::Format(format!("invalid cell value {:?}", token))),
            None => Err(GridError::Format("ASCII grid ended early".to_string())),
        }
    }
}

fn parse<V: FromStr>(key: &str, value: Option<&str>) -> GridResult<V> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| GridError::Format(format!("invalid value for {}: {:?}", key, value)))
}

fn missing(key: &str) -> GridError {
    GridError::Format(format!("ASCII grid header has no {}", key))
}

/// Write `grid` as an ESRI ASCII grid.
pub fn write_ascii<T: GridValue, W: Write>(
    grid: &Grid<T>,
    cache: &mut ChunkCache,
    out: W,
) -> GridResult<()> {
    let mut out = BufWriter::new(out);
    let dims = grid.dimensions();
    writeln!(out, "ncols         {}", grid.ncols())?;
    writeln!(out, "nrows         {}", grid.nrows())?;
    writeln!(out, "xllcorner     {}", dims.xmin())?;
    writeln!(out, "yllcorner     {}", dims.ymin())?;
    writeln!(out, "cellsize      {}", dims.cellsize())?;
    writeln!(out, "NODATA_value  {}", grid.no_data().to_f64())?;
    for row in (0..grid.nrows()).rev() {
        for col in 0..grid.ncols() {
            if col > 0 {
                out.write_all(b" ")?;
            }
            write!(out, "{}", grid.get_cell(cache, row, col)?.to_f64())?;
        }
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Write `grid` to an ESRI ASCII file at `path`.
pub fn export_ascii<T: GridValue>(
    grid: &Grid<T>,
    cache: &mut ChunkCache,
    path: impl AsRef<Path>,
) -> GridResult<()> {
    write_ascii(grid, cache, File::create(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "ncols 3\nNROWS 2\nxllcenter 0.5\nyllcorner 10\ncellsize 1\nNODATA_value -9999\n1 2 3\n4 -9999\n6\n";

    #[test]
    fn test_reads_header_and_values() {
        let mut reader = AsciiGridReader::new(Cursor::new(SAMPLE)).unwrap();
        let header = reader.header().clone();
        assert_eq!(header.nrows, 2);
        assert_eq!(header.ncols, 3);
        assert_eq!(header.no_data, Some(-9999.0));
        assert_eq!(header.dimensions.xmin(), &BigDecimal::from(0));
        assert_eq!(header.dimensions.ymin(), &BigDecimal::from(10));
        assert_eq!(header.dimensions.xmax(), &BigDecimal::from(3));

        let values: Vec<f64> = (0..6).map(|_| reader.next_value().unwrap()).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, -9999.0, 6.0]);
        assert!(matches!(reader.next_value(), Err(GridError::Format(_))));
    }

    #[test]
    fn test_missing_header_key() {
        let text = "ncols 3\nnrows 2\nxllcorner 0\ncellsize 1\n1 2 3\n";
        let err = AsciiGridReader::new(Cursor::new(text)).err().unwrap();
        assert!(err.to_string().contains("yllcorner"));
    }

    #[test]
    fn test_bad_value() {
        let text = "ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\nabc\n";
        let mut reader = AsciiGridReader::new(Cursor::new(text)).unwrap();
        assert!(reader.next_value().is_err());
    }
}
