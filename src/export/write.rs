//! Text export of simulation arrays
//!
//! Dumps DOF vectors and particle matrices to comma-delimited text files,
//! one matrix row per line. Diagnostics only; no numerical contract.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::{DMatrix, DVector};

use crate::error::DemResult;

/// Write a DOF vector [ndof], one value per line.
pub fn dump_vector(path: impl AsRef<Path>, vector: &DVector<f64>) -> DemResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for value in vector.iter() {
        writeln!(file, "{value}")?;
    }
    Ok(())
}

/// Write a particle matrix [N, ndim], comma-delimited, one particle per line.
pub fn dump_matrix(path: impl AsRef<Path>, matrix: &DMatrix<f64>) -> DemResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for r in 0..matrix.nrows() {
        let row: Vec<String> = (0..matrix.ncols()).map(|c| matrix[(r, c)].to_string()).collect();
        writeln!(file, "{}", row.join(", "))?;
    }
    Ok(())
}
