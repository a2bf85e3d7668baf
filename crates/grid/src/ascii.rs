//! Arc-ascii grid parsing and writing.
//!
//! The header carries six labelled lines (`ncols`, `nrows`, `xllcorner`,
//! `yllcorner`, `cellsize`, `NODATA_value`), followed by `nrows * ncols`
//! whitespace-separated integer samples in row-major order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use retin_geometry::{Coord, Elev};

use crate::GridError;

/// Parsed arc-ascii header plus the georeference it carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridHeader {
    pub ncols: Coord,
    pub nrows: Coord,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata: Elev,
}

impl GridHeader {
    pub fn cells(&self) -> u64 {
        self.nrows as u64 * self.ncols as u64
    }
}

/// An in-memory raster. Only sensible for rasters that fit in memory; the
/// refinement pipeline itself streams through [`crate::TiledGrid`] instead.
#[derive(Clone, Debug)]
pub struct Grid {
    pub header: GridHeader,
    data: Vec<Elev>,
}

impl Grid {
    pub fn new(header: GridHeader, data: Vec<Elev>) -> Self {
        debug_assert_eq!(data.len() as u64, header.cells());
        Self { header, data }
    }

    pub fn value(&self, row: Coord, col: Coord) -> Elev {
        self.data[row as usize * self.header.ncols as usize + col as usize]
    }
}

/// Streaming tokenizer over the whitespace-separated sample section.
pub(crate) struct SampleTokens<R: BufRead> {
    reader: R,
    line: String,
    tokens: Vec<i64>,
    next: usize,
}

impl<R: BufRead> SampleTokens<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            tokens: Vec::new(),
            next: 0,
        }
    }

    /// The next raw sample value, or an error when the stream runs dry or a
    /// token fails to parse.
    pub(crate) fn next_value(&mut self) -> Result<i64, String> {
        while self.next >= self.tokens.len() {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|err| format!("read failed: {err}"))?;
            if read == 0 {
                return Err(String::from("raster data ended early"));
            }
            self.tokens.clear();
            for token in self.line.split_whitespace() {
                let value = token
                    .parse::<i64>()
                    .map_err(|_| format!("malformed sample {token:?}"))?;
                self.tokens.push(value);
            }
            self.next = 0;
        }
        let value = self.tokens[self.next];
        self.next += 1;
        Ok(value)
    }
}

fn header_line<R: BufRead>(reader: &mut R, key: &str) -> Result<String, String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|err| format!("read failed: {err}"))?;
    if read == 0 {
        return Err(format!("missing header line {key:?}"));
    }
    let mut parts = line.split_whitespace();
    let label = parts.next().ok_or_else(|| format!("empty header line, expected {key:?}"))?;
    if !label.eq_ignore_ascii_case(key) {
        return Err(format!("expected header line {key:?}, found {label:?}"));
    }
    parts
        .next()
        .map(str::to_owned)
        .ok_or_else(|| format!("header line {key:?} has no value"))
}

pub(crate) fn parse_header<R: BufRead>(reader: &mut R) -> Result<GridHeader, String> {
    let ncols: i64 = header_line(reader, "ncols")?
        .parse()
        .map_err(|_| String::from("ncols is not an integer"))?;
    let nrows: i64 = header_line(reader, "nrows")?
        .parse()
        .map_err(|_| String::from("nrows is not an integer"))?;
    let xllcorner: f64 = header_line(reader, "xllcorner")?
        .parse()
        .map_err(|_| String::from("xllcorner is not a number"))?;
    let yllcorner: f64 = header_line(reader, "yllcorner")?
        .parse()
        .map_err(|_| String::from("yllcorner is not a number"))?;
    let cellsize: f64 = header_line(reader, "cellsize")?
        .parse()
        .map_err(|_| String::from("cellsize is not a number"))?;
    let nodata: i64 = header_line(reader, "NODATA_value")?
        .parse()
        .map_err(|_| String::from("NODATA_value is not an integer"))?;

    for (name, value) in [("nrows", nrows), ("ncols", ncols)] {
        if value < 2 || value > Coord::MAX as i64 {
            return Err(format!(
                "{name} is {value}, supported range is 2..={}",
                Coord::MAX
            ));
        }
    }
    if nodata < Elev::MIN as i64 || nodata > Elev::MAX as i64 {
        return Err(format!("NODATA_value {nodata} out of elevation range"));
    }

    Ok(GridHeader {
        ncols: ncols as Coord,
        nrows: nrows as Coord,
        xllcorner,
        yllcorner,
        cellsize,
        nodata: nodata as Elev,
    })
}

pub(crate) fn check_sample(value: i64) -> Result<Elev, String> {
    if value < Elev::MIN as i64 || value > Elev::MAX as i64 {
        return Err(format!("sample {value} out of elevation range"));
    }
    Ok(value as Elev)
}

/// Read a whole raster into memory.
pub fn read_grid(path: &Path) -> Result<Grid, GridError> {
    let file = File::open(path).map_err(|err| GridError::io(path, err))?;
    let mut reader = BufReader::new(file);
    let header = parse_header(&mut reader).map_err(GridError::InvalidRaster)?;

    let mut data = Vec::with_capacity(header.cells() as usize);
    let mut tokens = SampleTokens::new(reader);
    for _ in 0..header.cells() {
        let value = tokens.next_value().map_err(GridError::InvalidRaster)?;
        data.push(check_sample(value).map_err(GridError::InvalidRaster)?);
    }
    Ok(Grid::new(header, data))
}

/// Write a raster in arc-ascii form.
pub fn write_grid(grid: &Grid, path: &Path) -> Result<(), GridError> {
    let file = File::create(path).map_err(|err| GridError::io(path, err))?;
    let mut w = BufWriter::new(file);
    let h = &grid.header;
    let formatted = format!(
        "ncols\t\t{}\nnrows\t\t{}\nxllcorner\t{}\nyllcorner\t{}\ncellsize\t{}\nNODATA_value\t{}\n",
        h.ncols, h.nrows, h.xllcorner, h.yllcorner, h.cellsize, h.nodata
    );
    let mut write = |bytes: &[u8]| w.write_all(bytes).map_err(|err| GridError::io(path, err));
    write(formatted.as_bytes())?;
    for row in 0..h.nrows {
        let mut line = String::new();
        for col in 0..h.ncols {
            if col > 0 {
                line.push(' ');
            }
            line.push_str(&grid.value(row, col).to_string());
        }
        line.push('\n');
        write(line.as_bytes())?;
    }
    w.flush().map_err(|err| GridError::io(path, err))
}
