// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Matrix views over caller-owned flat buffers.
//!
//! A view is a [`Layout`] (rows, cols, orientation) plus a borrowed slice.
//! Nothing here owns or allocates storage: the caller binds a buffer of
//! exactly `rows * cols` scalars and the view resolves logical `(row, col)`
//! indices into it.
//!
//! Address resolution:
//! - row-major: `row * cols + col`
//! - col-major: `col * rows + row`
//!
//! Transpose flips the orientation and swaps rows/cols, so the same buffer
//! is read as its transpose without moving a single element. Applying it
//! twice restores the starting indexing function.
//!
//! Read-only inputs are [`MatrixView`] (`&[f32]`, `Copy`), outputs are
//! [`MatrixViewMut`] (`&mut [f32]`). The borrow checker therefore rejects an
//! operation whose output aliases one of its inputs.

use std::fmt;

use crate::error::{ContractViolation, Result};

/// Storage scalar.
pub type Scalar = f32;

/// Accumulator for reductions (dot products, layer-norm moments).
/// Wider than [`Scalar`] to keep rounding error out of long sums.
pub(crate) type Accum = f64;

macro_rules! panic_wrapper {
    (pub fn $name:ident(&self $(, $arg:ident : $ty:ty)*) -> $ret:ty => $try_name:ident) => {
        pub fn $name(&self $(, $arg: $ty)*) -> $ret {
            match self.$try_name($($arg),*) {
                Ok(v) => v,
                Err(e) => panic!("{e}"),
            }
        }
    };
    (pub fn $name:ident(&mut self $(, $arg:ident : $ty:ty)*) -> $ret:ty => $try_name:ident) => {
        pub fn $name(&mut self $(, $arg: $ty)*) -> $ret {
            match self.$try_name($($arg),*) {
                Ok(v) => v,
                Err(e) => panic!("{e}"),
            }
        }
    };
    (pub fn $name:ident(self $(, $arg:ident : $ty:ty)*) -> $ret:ty => $try_name:ident) => {
        pub fn $name(self $(, $arg: $ty)*) -> $ret {
            match self.$try_name($($arg),*) {
                Ok(v) => v,
                Err(e) => panic!("{e}"),
            }
        }
    };
}

/// Physical orientation of a view over its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    RowMajor,
    ColMajor,
}

impl Order {
    pub fn flipped(self) -> Self {
        match self {
            Self::RowMajor => Self::ColMajor,
            Self::ColMajor => Self::RowMajor,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowMajor => f.write_str("row-major"),
            Self::ColMajor => f.write_str("col-major"),
        }
    }
}

/// Shape and orientation of a view. Carries no data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    rows: usize,
    cols: usize,
    order: Order,
}

impl Layout {
    pub const fn new(rows: usize, cols: usize, order: Order) -> Self {
        Self { rows, cols, order }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    /// Same logical shape. Orientation is irrelevant to every elementwise op.
    pub fn same_shape(&self, other: &Layout) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    pub fn transposed(self) -> Self {
        Self {
            rows: self.cols,
            cols: self.rows,
            order: self.order.flipped(),
        }
    }

    /// Flat buffer offset of `(row, col)`. Bounds are the caller's business.
    #[inline]
    pub fn offset(&self, row: usize, col: usize) -> usize {
        match self.order {
            Order::RowMajor => row * self.cols + col,
            Order::ColMajor => col * self.rows + row,
        }
    }

    pub fn try_offset(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.rows || col >= self.cols {
            return Err(ContractViolation::IndexOutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(self.offset(row, col))
    }

    /// Check this layout against an expected logical shape.
    pub(crate) fn expect_shape(&self, op: &'static str, rows: usize, cols: usize) -> Result<()> {
        if self.rows != rows || self.cols != cols {
            return Err(ContractViolation::ShapeMismatch {
                op,
                lhs: *self,
                rhs: Layout::new(rows, cols, self.order),
            });
        }
        Ok(())
    }

    // An overflowing `rows * cols` can never match a real buffer; it is
    // reported saturated.
    fn try_bind(len: usize, rows: usize, cols: usize, order: Order) -> Result<Self> {
        match rows.checked_mul(cols) {
            Some(expected) if expected == len => Ok(Self::new(rows, cols, order)),
            _ => Err(ContractViolation::BufferLength {
                rows,
                cols,
                expected: rows.saturating_mul(cols),
                len,
            }),
        }
    }

    /// Element range of rows `[start, start + len)` in a row-major buffer.
    fn try_row_range(&self, op: &'static str, start: usize, len: usize) -> Result<(usize, usize)> {
        if self.order != Order::RowMajor {
            return Err(ContractViolation::NotRowMajor { op, layout: *self });
        }
        match start.checked_add(len) {
            Some(end) if end <= self.rows => Ok((start * self.cols, end * self.cols)),
            _ => Err(ContractViolation::RowRange {
                start,
                end: start.saturating_add(len),
                rows: self.rows,
            }),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.rows, self.cols, self.order)
    }
}

// Debug rendering: one logical row per line, six columns per entry.
fn fmt_matrix(layout: &Layout, data: &[Scalar], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for r in 0..layout.rows {
        for c in 0..layout.cols {
            write!(f, "{:6.2}", data[layout.offset(r, c)])?;
        }
        writeln!(f)?;
    }
    Ok(())
}

/// Read-only view over a borrowed buffer.
#[derive(Clone, Copy, Debug)]
pub struct MatrixView<'a> {
    layout: Layout,
    data: &'a [Scalar],
}

impl<'a> MatrixView<'a> {
    /// Bind `data` as a row-major `rows x cols` matrix.
    pub fn try_new(data: &'a [Scalar], rows: usize, cols: usize) -> Result<Self> {
        Self::try_with_order(data, rows, cols, Order::RowMajor)
    }

    pub fn new(data: &'a [Scalar], rows: usize, cols: usize) -> Self {
        match Self::try_new(data, rows, cols) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_with_order(data: &'a [Scalar], rows: usize, cols: usize, order: Order) -> Result<Self> {
        let layout = Layout::try_bind(data.len(), rows, cols, order)?;
        Ok(Self { layout, data })
    }

    pub fn rows(&self) -> usize {
        self.layout.rows
    }

    pub fn cols(&self) -> usize {
        self.layout.cols
    }

    pub fn order(&self) -> Order {
        self.layout.order
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The backing buffer in physical order.
    pub fn as_slice(&self) -> &'a [Scalar] {
        self.data
    }

    /// Unchecked-shape read used inside validated loops.
    #[inline]
    pub(crate) fn at(&self, row: usize, col: usize) -> Scalar {
        self.data[self.layout.offset(row, col)]
    }

    pub fn try_get(&self, row: usize, col: usize) -> Result<Scalar> {
        self.layout.try_offset(row, col).map(|i| self.data[i])
    }

    panic_wrapper!(pub fn get(&self, row: usize, col: usize) -> Scalar => try_get);

    pub fn transpose(&mut self) {
        self.layout = self.layout.transposed();
    }

    #[must_use]
    pub fn t(mut self) -> Self {
        self.transpose();
        self
    }

    /// View over rows `[start, start + len)`. Only row-major views keep a
    /// row block contiguous, so col-major views are rejected.
    pub fn try_row_block(self, start: usize, len: usize) -> Result<MatrixView<'a>> {
        let (lo, hi) = self.layout.try_row_range("row_block", start, len)?;
        Ok(MatrixView {
            layout: Layout::new(len, self.layout.cols, Order::RowMajor),
            data: &self.data[lo..hi],
        })
    }

    panic_wrapper!(pub fn row_block(self, start: usize, len: usize) -> MatrixView<'a> => try_row_block);
}

impl fmt::Display for MatrixView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_matrix(&self.layout, self.data, f)
    }
}

/// Exclusive view over a borrowed buffer; the output side of every op.
#[derive(Debug)]
pub struct MatrixViewMut<'a> {
    layout: Layout,
    data: &'a mut [Scalar],
}

impl<'a> MatrixViewMut<'a> {
    pub fn try_new(data: &'a mut [Scalar], rows: usize, cols: usize) -> Result<Self> {
        Self::try_with_order(data, rows, cols, Order::RowMajor)
    }

    pub fn new(data: &'a mut [Scalar], rows: usize, cols: usize) -> Self {
        match Self::try_new(data, rows, cols) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_with_order(
        data: &'a mut [Scalar],
        rows: usize,
        cols: usize,
        order: Order,
    ) -> Result<Self> {
        let layout = Layout::try_bind(data.len(), rows, cols, order)?;
        Ok(Self { layout, data })
    }

    pub fn rows(&self) -> usize {
        self.layout.rows
    }

    pub fn cols(&self) -> usize {
        self.layout.cols
    }

    pub fn order(&self) -> Order {
        self.layout.order
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[Scalar] {
        &*self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Scalar] {
        &mut *self.data
    }

    /// Read-only reborrow, for passing an output buffer on as the next input.
    pub fn as_view(&self) -> MatrixView<'_> {
        MatrixView {
            layout: self.layout,
            data: &*self.data,
        }
    }

    /// Shorter-lived exclusive reborrow with the same layout.
    pub fn reborrow(&mut self) -> MatrixViewMut<'_> {
        MatrixViewMut {
            layout: self.layout,
            data: &mut *self.data,
        }
    }

    #[inline]
    pub(crate) fn at(&self, row: usize, col: usize) -> Scalar {
        self.data[self.layout.offset(row, col)]
    }

    #[inline]
    pub(crate) fn put(&mut self, row: usize, col: usize, value: Scalar) {
        self.data[self.layout.offset(row, col)] = value;
    }

    pub fn try_get(&self, row: usize, col: usize) -> Result<Scalar> {
        self.layout.try_offset(row, col).map(|i| self.data[i])
    }

    panic_wrapper!(pub fn get(&self, row: usize, col: usize) -> Scalar => try_get);

    pub fn try_set(&mut self, row: usize, col: usize, value: Scalar) -> Result<()> {
        let i = self.layout.try_offset(row, col)?;
        self.data[i] = value;
        Ok(())
    }

    pub fn set(&mut self, row: usize, col: usize, value: Scalar) {
        if let Err(e) = self.try_set(row, col, value) {
            panic!("{e}");
        }
    }

    pub fn transpose(&mut self) {
        self.layout = self.layout.transposed();
    }

    #[must_use]
    pub fn t(mut self) -> Self {
        self.transpose();
        self
    }

    pub fn try_row_block_mut(&mut self, start: usize, len: usize) -> Result<MatrixViewMut<'_>> {
        let (lo, hi) = self.layout.try_row_range("row_block_mut", start, len)?;
        Ok(MatrixViewMut {
            layout: Layout::new(len, self.layout.cols, Order::RowMajor),
            data: &mut self.data[lo..hi],
        })
    }

    panic_wrapper!(pub fn row_block_mut(&mut self, start: usize, len: usize) -> MatrixViewMut<'_> => try_row_block_mut);

    /// Split a row-major view into consecutive, disjoint blocks of
    /// `rows_per_block` rows each. `rows()` must be a multiple of it.
    pub fn try_row_blocks_mut(
        &mut self,
        rows_per_block: usize,
    ) -> Result<impl Iterator<Item = MatrixViewMut<'_>>> {
        let rows = self.layout.rows;
        if rows_per_block == 0 || rows % rows_per_block != 0 {
            return Err(ContractViolation::RowRange {
                start: 0,
                end: rows_per_block,
                rows,
            });
        }
        let (lo, hi) = self.layout.try_row_range("row_blocks_mut", 0, rows)?;
        let layout = Layout::new(rows_per_block, self.layout.cols, Order::RowMajor);
        let chunk = layout.numel().max(1);
        Ok(self.data[lo..hi]
            .chunks_exact_mut(chunk)
            .map(move |data| MatrixViewMut { layout, data }))
    }

    pub fn fill(&mut self, value: Scalar) {
        self.data.fill(value);
    }

    /// Elementwise in-place map. Orientation-agnostic: every element is
    /// visited exactly once regardless of layout.
    #[inline]
    pub(crate) fn map_in_place(&mut self, op: impl Fn(Scalar) -> Scalar) {
        for v in self.data.iter_mut() {
            *v = op(*v);
        }
    }

    /// Copy `src` into this view by logical index. Shapes must match;
    /// orientations may differ.
    pub fn try_copy_from(&mut self, src: &MatrixView<'_>) -> Result<()> {
        if !self.layout.same_shape(&src.layout) {
            return Err(ContractViolation::ShapeMismatch {
                op: "copy_from",
                lhs: self.layout,
                rhs: src.layout,
            });
        }
        if self.layout.order == src.layout.order {
            self.data.copy_from_slice(src.data);
            return Ok(());
        }
        for r in 0..self.layout.rows {
            for c in 0..self.layout.cols {
                self.put(r, c, src.at(r, c));
            }
        }
        Ok(())
    }

    pub fn copy_from(&mut self, src: &MatrixView<'_>) {
        if let Err(e) = self.try_copy_from(src) {
            panic!("{e}");
        }
    }
}

impl fmt::Display for MatrixViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_matrix(&self.layout, &*self.data, f)
    }
}
