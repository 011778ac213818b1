// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Contract violations.
//!
//! Every shape-checked operation validates its preconditions at entry and
//! reports the first failed condition as a [`ContractViolation`]. The
//! `try_*` functions return it; the plain functions panic with its message
//! (see `fail_fast!`).

use thiserror::Error;

use crate::matrix::Layout;

/// The single error kind of the crate: a shape or index precondition failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("buffer length {len} does not match {rows}x{cols} = {expected}")]
    BufferLength {
        rows: usize,
        cols: usize,
        expected: usize,
        len: usize,
    },

    #[error("index ({row}, {col}) out of bounds for {rows}x{cols} view")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{op}: shape mismatch, {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Layout,
        rhs: Layout,
    },

    #[error("{op}: expected a row-major view, got {layout}")]
    NotRowMajor { op: &'static str, layout: Layout },

    #[error("row block [{start}, {end}) exceeds {rows} rows")]
    RowRange {
        start: usize,
        end: usize,
        rows: usize,
    },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}

pub type Result<T> = std::result::Result<T, ContractViolation>;

/// Generates the fail-fast form of a `try_*` function: same arguments, panics
/// with the violation's diagnostic instead of returning it.
macro_rules! fail_fast {
    ($(#[$meta:meta])* pub fn $name:ident($($arg:ident : $ty:ty),* $(,)?) => $try_name:ident) => {
        $(#[$meta])*
        pub fn $name($($arg: $ty),*) {
            if let Err(e) = $try_name($($arg),*) {
                panic!("{e}");
            }
        }
    };
}

pub(crate) use fail_fast;
