//! Plain-text pedestal tables.
//!
//! One line per grid row (top row first), 21 whitespace-separated
//! baselines per line. Blank lines and everything after `#` are ignored.
//! Uncalibrated pixels are written as `0`.

use crate::{Error, Result};
use log::debug;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tinytpc_anode::PedestalMap;
use tinytpc_core::GRID_SIZE;

/// Parse a pedestal table into a `[row, col]` array.
pub fn parse_pedestal_table(text: &str) -> Result<Array2<f64>> {
    let mut values = Vec::with_capacity(GRID_SIZE * GRID_SIZE);
    let mut rows = 0usize;
    for (n, raw) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        if rows == GRID_SIZE {
            return Err(Error::parse(
                line_no,
                format!("more than {GRID_SIZE} rows"),
            ));
        }
        let before = values.len();
        for token in line.split_whitespace() {
            let value: f64 = token
                .parse()
                .map_err(|_| Error::parse(line_no, format!("invalid number '{token}'")))?;
            values.push(value);
        }
        let found = values.len() - before;
        if found != GRID_SIZE {
            return Err(Error::parse(
                line_no,
                format!("expected {GRID_SIZE} values, found {found}"),
            ));
        }
        rows += 1;
    }
    if rows != GRID_SIZE {
        return Err(Error::InvalidFormat(format!(
            "pedestal table has {rows} rows, expected {GRID_SIZE}"
        )));
    }
    Array2::from_shape_vec((GRID_SIZE, GRID_SIZE), values)
        .map_err(|e| Error::InvalidFormat(e.to_string()))
}

/// Read a pedestal table file into a [`PedestalMap`].
pub fn read_pedestal_table<P: AsRef<Path>>(path: P) -> Result<PedestalMap> {
    let text = std::fs::read_to_string(&path)?;
    let baselines = parse_pedestal_table(&text)?;
    debug!("Read pedestal table {}", path.as_ref().display());
    Ok(PedestalMap::load(baselines)?)
}

/// Write the baselines of `pedestal` as a table.
pub fn write_pedestal_table<W: Write>(writer: &mut W, pedestal: &PedestalMap) -> Result<()> {
    writeln!(
        writer,
        "# pedestal baselines, {GRID_SIZE} rows of {GRID_SIZE} columns, 0 = uncalibrated"
    )?;
    for row in pedestal.baselines().rows() {
        let line: Vec<String> = row.iter().map(ToString::to_string).collect();
        writeln!(writer, "{}", line.join(" "))?;
    }
    Ok(())
}

/// Write a pedestal table file.
pub fn save_pedestal_table<P: AsRef<Path>>(path: P, pedestal: &PedestalMap) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_pedestal_table(&mut writer, pedestal)?;
    writer.flush()?;
    Ok(())
}
