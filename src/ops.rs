// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Arithmetic and activation primitives over matrix views.
//!
//! Every op writes only to the view passed as `&mut`; inputs are shared
//! borrows and are never touched. Shapes are checked once at entry, before
//! any element is written. Each shape-checked op comes in two forms:
//! `try_<op>` returns the [`ContractViolation`], `<op>` panics with it.
//!
//! All ops work on logical indices, so any argument may be a transposed view.

use crate::error::{ContractViolation, Result, fail_fast};
use crate::matrix::{Accum, Layout, MatrixView, MatrixViewMut, Scalar};

fn ensure(op: &'static str, ok: bool, lhs: Layout, rhs: Layout) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(ContractViolation::ShapeMismatch { op, lhs, rhs })
    }
}

/// Matrix multiply: `out = lhs @ rhs`.
///
/// Requires `lhs.rows == out.rows`, `lhs.cols == rhs.rows`,
/// `rhs.cols == out.cols`. Sums accumulate in `f64` and are rounded once on
/// store. Output is produced row by row.
pub fn try_dot(
    lhs: &MatrixView<'_>,
    rhs: &MatrixView<'_>,
    out: &mut MatrixViewMut<'_>,
) -> Result<()> {
    ensure("dot", lhs.cols() == rhs.rows(), lhs.layout(), rhs.layout())?;
    ensure(
        "dot",
        lhs.rows() == out.rows() && rhs.cols() == out.cols(),
        Layout::new(lhs.rows(), rhs.cols(), lhs.order()),
        out.layout(),
    )?;

    let inner = lhs.cols();
    for r in 0..out.rows() {
        for c in 0..out.cols() {
            let mut sum: Accum = 0.0;
            for i in 0..inner {
                sum += Accum::from(lhs.at(r, i)) * Accum::from(rhs.at(i, c));
            }
            out.put(r, c, sum as Scalar);
        }
    }
    Ok(())
}

fail_fast!(
    /// Fail-fast [`try_dot`].
    pub fn dot(lhs: &MatrixView<'_>, rhs: &MatrixView<'_>, out: &mut MatrixViewMut<'_>) => try_dot
);

/// Elementwise `out = lhs + rhs`. All three shapes must match.
pub fn try_add(
    lhs: &MatrixView<'_>,
    rhs: &MatrixView<'_>,
    out: &mut MatrixViewMut<'_>,
) -> Result<()> {
    ensure("add", lhs.layout().same_shape(&rhs.layout()), lhs.layout(), rhs.layout())?;
    ensure("add", lhs.layout().same_shape(&out.layout()), lhs.layout(), out.layout())?;
    for r in 0..out.rows() {
        for c in 0..out.cols() {
            out.put(r, c, lhs.at(r, c) + rhs.at(r, c));
        }
    }
    Ok(())
}

fail_fast!(
    /// Fail-fast [`try_add`].
    pub fn add(lhs: &MatrixView<'_>, rhs: &MatrixView<'_>, out: &mut MatrixViewMut<'_>) => try_add
);

/// In-place elementwise `m += rhs`. This is `add(m, rhs, m)` without the
/// aliasing, used for residual connections.
pub fn try_add_assign(m: &mut MatrixViewMut<'_>, rhs: &MatrixView<'_>) -> Result<()> {
    ensure("add_assign", m.layout().same_shape(&rhs.layout()), m.layout(), rhs.layout())?;
    if m.order() == rhs.order() {
        for (a, &b) in m.as_mut_slice().iter_mut().zip(rhs.as_slice()) {
            *a += b;
        }
        return Ok(());
    }
    for r in 0..m.rows() {
        for c in 0..m.cols() {
            let v = m.at(r, c) + rhs.at(r, c);
            m.put(r, c, v);
        }
    }
    Ok(())
}

fail_fast!(
    /// Fail-fast [`try_add_assign`].
    pub fn add_assign(m: &mut MatrixViewMut<'_>, rhs: &MatrixView<'_>) => try_add_assign
);

/// Broadcast a one-column bias over every column: `m[r, c] += bias[r, 0]`.
pub fn try_add_bias(m: &mut MatrixViewMut<'_>, bias: &MatrixView<'_>) -> Result<()> {
    ensure(
        "add_bias",
        bias.cols() == 1 && bias.rows() == m.rows(),
        m.layout(),
        bias.layout(),
    )?;
    for r in 0..m.rows() {
        let b = bias.at(r, 0);
        for c in 0..m.cols() {
            let v = m.at(r, c) + b;
            m.put(r, c, v);
        }
    }
    Ok(())
}

fail_fast!(
    /// Fail-fast [`try_add_bias`].
    pub fn add_bias(m: &mut MatrixViewMut<'_>, bias: &MatrixView<'_>) => try_add_bias
);

/// In-place `m /= divisor`. No shape precondition; a zero divisor follows
/// IEEE semantics.
pub fn divide_scalar(m: &mut MatrixViewMut<'_>, divisor: Scalar) {
    m.map_in_place(|x| x / divisor);
}

/// In-place elementwise `exp`.
pub fn exp_inplace(m: &mut MatrixViewMut<'_>) {
    m.map_in_place(Scalar::exp);
}

/// In-place ReLU: negative entries become zero.
pub fn relu_inplace(m: &mut MatrixViewMut<'_>) {
    m.map_in_place(|x| if x < 0.0 { 0.0 } else { x });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot() {
        // [2, 3] @ [3, 2] = [2, 2]
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut c = [0.0; 4];
        dot(
            &MatrixView::new(&a, 2, 3),
            &MatrixView::new(&b, 3, 2),
            &mut MatrixViewMut::new(&mut c, 2, 2),
        );
        // c[0,0] = 1*1 + 2*3 + 3*5 = 22, c[0,1] = 1*2 + 2*4 + 3*6 = 28
        assert_eq!(c, [22.0, 28.0, 49.0, 64.0]);
    }

    #[test]
    fn test_dot_transposed_operand() {
        // a^T @ a for a = [[1, 2], [3, 4]] -> [[10, 14], [14, 20]]
        let a = [1.0, 2.0, 3.0, 4.0];
        let mut c = [0.0; 4];
        let view = MatrixView::new(&a, 2, 2);
        dot(&view.t(), &view, &mut MatrixViewMut::new(&mut c, 2, 2));
        assert_eq!(c, [10.0, 14.0, 14.0, 20.0]);
    }

    #[test]
    fn test_try_dot_inner_mismatch() {
        let a = [0.0; 6];
        let mut c = [0.0; 4];
        let err = try_dot(
            &MatrixView::new(&a, 2, 3),
            &MatrixView::new(&a, 2, 3),
            &mut MatrixViewMut::new(&mut c, 2, 2),
        )
        .unwrap_err();
        assert!(matches!(err, ContractViolation::ShapeMismatch { op: "dot", .. }));
    }

    #[test]
    fn test_try_dot_output_mismatch_leaves_output_untouched() {
        let a = [1.0; 6];
        let mut c = [7.0; 6];
        let result = try_dot(
            &MatrixView::new(&a, 2, 3),
            &MatrixView::new(&a, 3, 2),
            &mut MatrixViewMut::new(&mut c, 3, 2),
        );
        assert!(result.is_err());
        assert!(c.iter().all(|&x| x == 7.0));
    }

    #[test]
    #[should_panic(expected = "dot: shape mismatch")]
    fn test_dot_panics_on_mismatch() {
        let a = [0.0; 6];
        let mut c = [0.0; 9];
        dot(
            &MatrixView::new(&a, 3, 2),
            &MatrixView::new(&a, 3, 2),
            &mut MatrixViewMut::new(&mut c, 3, 3),
        );
    }

    #[test]
    fn test_add() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [10.0, 20.0, 30.0, 40.0];
        let mut c = [0.0; 4];
        add(
            &MatrixView::new(&a, 2, 2),
            &MatrixView::new(&b, 2, 2),
            &mut MatrixViewMut::new(&mut c, 2, 2),
        );
        assert_eq!(c, [11.0, 22.0, 33.0, 44.0]);
    }

    #[test]
    fn test_add_mixed_orientation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let mut c = [0.0; 4];
        let v = MatrixView::new(&a, 2, 2);
        add(&v, &v.t(), &mut MatrixViewMut::new(&mut c, 2, 2));
        assert_eq!(c, [2.0, 5.0, 5.0, 8.0]);
    }

    #[test]
    fn test_try_add_shape_mismatch() {
        let a = [0.0; 6];
        let mut c = [0.0; 6];
        let result = try_add(
            &MatrixView::new(&a, 2, 3),
            &MatrixView::new(&a, 3, 2),
            &mut MatrixViewMut::new(&mut c, 2, 3),
        );
        assert!(matches!(result, Err(ContractViolation::ShapeMismatch { op: "add", .. })));
    }

    #[test]
    fn test_add_assign() {
        let mut a = [1.0, 2.0, 3.0, 4.0];
        let b = [1.0, 1.0, 1.0, 1.0];
        add_assign(&mut MatrixViewMut::new(&mut a, 2, 2), &MatrixView::new(&b, 2, 2));
        assert_eq!(a, [2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_add_assign_transposed_rhs() {
        let mut a = [0.0; 4];
        let b = [1.0, 2.0, 3.0, 4.0];
        add_assign(&mut MatrixViewMut::new(&mut a, 2, 2), &MatrixView::new(&b, 2, 2).t());
        assert_eq!(a, [1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_add_bias_broadcasts_across_columns() {
        let mut m = [0.0; 6];
        let bias = [1.0, -2.0];
        add_bias(&mut MatrixViewMut::new(&mut m, 2, 3), &MatrixView::new(&bias, 2, 1));
        assert_eq!(m, [1.0, 1.0, 1.0, -2.0, -2.0, -2.0]);
    }

    #[test]
    fn test_add_bias_rejects_row_vector() {
        let mut m = [0.0; 4];
        let bias = [1.0, 2.0];
        let result = try_add_bias(&mut MatrixViewMut::new(&mut m, 2, 2), &MatrixView::new(&bias, 1, 2));
        assert!(result.is_err());
    }

    #[test]
    fn test_divide_scalar() {
        let mut m = [2.0, 4.0, 6.0, 8.0];
        divide_scalar(&mut MatrixViewMut::new(&mut m, 2, 2), 2.0);
        assert_eq!(m, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_exp_inplace() {
        let mut m = [0.0, 1.0];
        exp_inplace(&mut MatrixViewMut::new(&mut m, 1, 2));
        assert_eq!(m[0], 1.0);
        assert!((m[1] - std::f32::consts::E).abs() < 1e-6);
    }

    #[test]
    fn test_relu_inplace() {
        let mut m = [-1.0, 0.0, 0.5, -0.0];
        relu_inplace(&mut MatrixViewMut::new(&mut m, 2, 2));
        assert_eq!(m, [0.0, 0.0, 0.5, 0.0]);
    }
}
