// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Causal masked softmax.
//!
//! For a `seq_len x seq_len` score matrix, column `c` becomes a probability
//! distribution over rows `0..=c` and every entry below the diagonal
//! (`row > c`) is zeroed:
//!
//!   p[r, c] = exp(s[r, c]) / sum_{i <= c} exp(s[i, c])   for r <= c
//!   p[r, c] = 0                                           for r >  c
//!
//! There is no max-subtraction step. Scores large enough to overflow `exp`
//! produce `inf`/`NaN`, and callers are expected to keep score magnitudes in
//! range (the attention block scales by `1/sqrt(head_dim)` beforehand).

use crate::error::{ContractViolation, Result, fail_fast};
use crate::matrix::{Accum, Layout, MatrixViewMut, Order, Scalar};
use crate::ops::exp_inplace;

/// Causal masked softmax over columns, in place.
///
/// `scratch` must be `1 x seq_len`; it receives the per-column normalizers
/// and is otherwise meaningless after the call.
pub fn try_causal_softmax(
    scores: &mut MatrixViewMut<'_>,
    scratch: &mut MatrixViewMut<'_>,
    seq_len: usize,
) -> Result<()> {
    let square = Layout::new(seq_len, seq_len, scores.order());
    if !scores.layout().same_shape(&square) {
        return Err(ContractViolation::ShapeMismatch {
            op: "causal_softmax",
            lhs: scores.layout(),
            rhs: square,
        });
    }
    let row = Layout::new(1, seq_len, Order::RowMajor);
    if !scratch.layout().same_shape(&row) {
        return Err(ContractViolation::ShapeMismatch {
            op: "causal_softmax",
            lhs: scratch.layout(),
            rhs: row,
        });
    }

    exp_inplace(scores);

    for c in 0..seq_len {
        let mut sum: Accum = 0.0;
        for r in 0..=c {
            sum += Accum::from(scores.at(r, c));
        }
        scratch.put(0, c, sum as Scalar);
    }

    for r in 0..seq_len {
        for c in 0..seq_len {
            let p = if r > c {
                0.0
            } else {
                scores.at(r, c) / scratch.at(0, c)
            };
            scores.put(r, c, p);
        }
    }
    Ok(())
}

fail_fast!(
    /// Fail-fast [`try_causal_softmax`].
    pub fn causal_softmax(
        scores: &mut MatrixViewMut<'_>,
        scratch: &mut MatrixViewMut<'_>,
        seq_len: usize,
    ) => try_causal_softmax
);
