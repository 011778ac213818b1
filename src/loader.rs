// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Plain-text buffer producer.
//!
//! Parses comma-separated numeric text (one matrix row per line) into an
//! owned flat buffer plus its shape. This sits outside the arithmetic core:
//! it is the one place that allocates, and the core only ever sees the
//! resulting buffer through a view.

use std::num::ParseFloatError;

use log::debug;
use thiserror::Error;

use crate::matrix::{MatrixView, MatrixViewMut, Scalar};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("no numeric rows in input")]
    Empty,

    #[error("line {line}: expected {expected} fields, got {got}")]
    RaggedRow {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("line {line}, field {field}: {source}")]
    InvalidNumber {
        line: usize,
        field: usize,
        #[source]
        source: ParseFloatError,
    },
}

/// Row-major owned buffer with a fixed shape.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBuffer {
    rows: usize,
    cols: usize,
    data: Vec<Scalar>,
}

impl MatrixBuffer {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[Scalar] {
        &self.data
    }

    pub fn into_data(self) -> Vec<Scalar> {
        self.data
    }

    pub fn view(&self) -> MatrixView<'_> {
        // rows * cols == data.len() holds by construction.
        MatrixView::new(&self.data, self.rows, self.cols)
    }

    pub fn view_mut(&mut self) -> MatrixViewMut<'_> {
        MatrixViewMut::new(&mut self.data, self.rows, self.cols)
    }
}

/// Parse comma-separated rows. Blank lines are skipped, fields are trimmed,
/// and every row must have the same number of fields as the first.
pub fn parse_csv(text: &str) -> Result<MatrixBuffer, LoadError> {
    let mut data = Vec::new();
    let mut cols = None;
    let mut rows = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let before = data.len();
        for (field, raw) in line.split(',').enumerate() {
            let value = raw
                .trim()
                .parse::<Scalar>()
                .map_err(|source| LoadError::InvalidNumber {
                    line: line_no,
                    field: field + 1,
                    source,
                })?;
            data.push(value);
        }
        let got = data.len() - before;
        let expected = *cols.get_or_insert(got);
        if got != expected {
            return Err(LoadError::RaggedRow {
                line: line_no,
                expected,
                got,
            });
        }
        rows += 1;
    }

    let cols = cols.ok_or(LoadError::Empty)?;
    debug!("parsed {rows}x{cols} matrix");
    Ok(MatrixBuffer { rows, cols, data })
}
