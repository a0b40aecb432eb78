//! LIBSVM text format
//!
//! One sample per line:
//!
//! ```text
//! label index:value index:value ...
//! ```
//!
//! Indices are kept exactly as written and must be strictly increasing.
//! Index 0 is accepted: precomputed-kernel files store the row id there.
//! Text after `#` is a comment; blank lines are skipped.

use crate::core::{Dataset, Problem, Result, SVMError, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset loaded from a LIBSVM format source
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl LibSVMDataset {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut samples = Vec::new();
        let mut dimensions = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(SVMError::IoError)?;
            let content = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line.as_str(),
            }
            .trim();

            if content.is_empty() {
                continue;
            }

            let sample = Self::parse_line(content).map_err(|e| {
                SVMError::ParseError(format!("line {}: {}", line_num + 1, e))
            })?;
            dimensions = dimensions.max(sample.features.max_index());
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        Ok(Self {
            samples,
            dimensions,
        })
    }

    /// Parse a single non-empty line
    fn parse_line(line: &str) -> std::result::Result<Sample, String> {
        let mut parts = line.split_whitespace();

        let label_str = parts.next().ok_or_else(|| "missing label".to_string())?;
        let label = label_str
            .parse::<f64>()
            .map_err(|_| format!("invalid label '{}'", label_str))?;

        let mut indices = Vec::new();
        let mut values = Vec::new();

        for feature in parts {
            let (idx_str, val_str) = feature
                .split_once(':')
                .ok_or_else(|| format!("invalid feature '{}', expected index:value", feature))?;

            let index = idx_str
                .parse::<usize>()
                .map_err(|_| format!("invalid feature index '{}'", idx_str))?;
            let value = val_str
                .parse::<f64>()
                .map_err(|_| format!("invalid feature value '{}'", val_str))?;

            if let Some(&prev) = indices.last() {
                if index <= prev {
                    return Err(format!(
                        "feature indices must be strictly increasing ({} after {})",
                        index, prev
                    ));
                }
            }

            indices.push(index);
            values.push(value);
        }

        Ok(Sample::new(SparseVector::new(indices, values), label))
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl Dataset for LibSVMDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }

    fn to_problem(&self) -> Result<Problem> {
        Problem::from_samples(self.samples.clone())
    }
}
