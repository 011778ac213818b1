// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Layer normalization and the position-wise feed-forward block.
//!
//! Activations are `D x S` views: one column per position, one row per
//! embedding feature. Weights are borrowed and never written. The only
//! buffers a block writes are the activation it is handed and the scratch
//! the caller sized for it.

use log::trace;

use crate::config::{Config, LAYER_NORM_EPS};
use crate::error::{Result, fail_fast};
use crate::matrix::{Accum, MatrixView, MatrixViewMut, Scalar};
use crate::ops::{relu_inplace, try_add_assign, try_add_bias, try_dot};

/// Layer normalization, in place.
///
/// The view is transposed so each position's feature column becomes a row,
/// then every row is standardized with its population mean and variance:
///
///   y[r, c] = weight[r] * (x[r, c] - mean_r) / sqrt(var_r + eps) + bias[r]
///
/// and the view is transposed back. `weight` and `bias` are one-column
/// vectors with one entry per post-transpose row, i.e. `m.cols()` entries.
pub fn try_layer_norm(
    m: &mut MatrixViewMut<'_>,
    weight: &MatrixView<'_>,
    bias: &MatrixView<'_>,
) -> Result<()> {
    weight.layout().expect_shape("layer_norm", m.cols(), 1)?;
    bias.layout().expect_shape("layer_norm", m.cols(), 1)?;

    m.transpose();
    let n = m.cols();
    for r in 0..m.rows() {
        let mut sum: Accum = 0.0;
        for c in 0..n {
            sum += Accum::from(m.at(r, c));
        }
        let mean = sum / n as Accum;

        let mut sq: Accum = 0.0;
        for c in 0..n {
            let d = Accum::from(m.at(r, c)) - mean;
            sq += d * d;
        }
        let var = sq / n as Accum;
        let std = (var + Accum::from(LAYER_NORM_EPS)).sqrt();

        let w = Accum::from(weight.at(r, 0));
        let b = Accum::from(bias.at(r, 0));
        for c in 0..n {
            let x = Accum::from(m.at(r, c));
            m.put(r, c, (w * (x - mean) / std + b) as Scalar);
        }
    }
    m.transpose();
    Ok(())
}

fail_fast!(
    /// Fail-fast [`try_layer_norm`].
    pub fn layer_norm(m: &mut MatrixViewMut<'_>, weight: &MatrixView<'_>, bias: &MatrixView<'_>) => try_layer_norm
);

/// Read-only parameters of the feed-forward block.
///
/// Shapes for `D = embed_dim`, `F = ffn_dim`:
/// - `ln_weight`, `ln_bias`: `D x 1`
/// - `fc_weight`: `F x D`, `fc_bias`: `F x 1`
/// - `proj_weight`: `D x F`, `proj_bias`: `D x 1`
#[derive(Clone, Copy, Debug)]
pub struct FeedForwardWeights<'a> {
    pub ln_weight: MatrixView<'a>,
    pub ln_bias: MatrixView<'a>,
    pub fc_weight: MatrixView<'a>,
    pub fc_bias: MatrixView<'a>,
    pub proj_weight: MatrixView<'a>,
    pub proj_bias: MatrixView<'a>,
}

impl FeedForwardWeights<'_> {
    pub fn validate(&self, config: &Config) -> Result<()> {
        let d = config.embed_dim;
        let f = config.ffn_dim();
        self.ln_weight.layout().expect_shape("feed_forward.ln_weight", d, 1)?;
        self.ln_bias.layout().expect_shape("feed_forward.ln_bias", d, 1)?;
        self.fc_weight.layout().expect_shape("feed_forward.fc_weight", f, d)?;
        self.fc_bias.layout().expect_shape("feed_forward.fc_bias", f, 1)?;
        self.proj_weight.layout().expect_shape("feed_forward.proj_weight", d, f)?;
        self.proj_bias.layout().expect_shape("feed_forward.proj_bias", d, 1)
    }
}

/// Caller-owned intermediate for the feed-forward block: `hidden` is
/// `ffn_dim x seq_len`.
#[derive(Debug)]
pub struct FeedForwardScratch<'a> {
    pub hidden: MatrixViewMut<'a>,
}

impl FeedForwardScratch<'_> {
    pub fn validate(&self, config: &Config) -> Result<()> {
        self.hidden
            .layout()
            .expect_shape("feed_forward.hidden", config.ffn_dim(), config.seq_len())
    }
}

/// Feed-forward block, in place on `x` (`D x S`):
///
///   x = proj_weight @ relu(fc_weight @ layer_norm(x) + fc_bias) + proj_bias + residual
///
/// `residual` must be an untouched copy of `x` as it was before the call;
/// the block does not snapshot its input.
pub fn try_feed_forward(
    x: &mut MatrixViewMut<'_>,
    residual: &MatrixView<'_>,
    weights: &FeedForwardWeights<'_>,
    scratch: &mut FeedForwardScratch<'_>,
    config: &Config,
) -> Result<()> {
    config.validate()?;
    let (d, s) = (config.embed_dim, config.seq_len());
    x.layout().expect_shape("feed_forward.x", d, s)?;
    residual.layout().expect_shape("feed_forward.residual", d, s)?;
    weights.validate(config)?;
    scratch.validate(config)?;
    trace!("feed_forward: x={} hidden={}", x.layout(), scratch.hidden.layout());

    try_layer_norm(x, &weights.ln_weight, &weights.ln_bias)?;

    let hidden = &mut scratch.hidden;
    try_dot(&weights.fc_weight, &x.as_view(), hidden)?;
    try_add_bias(hidden, &weights.fc_bias)?;
    relu_inplace(hidden);

    try_dot(&weights.proj_weight, &hidden.as_view(), x)?;
    try_add_bias(x, &weights.proj_bias)?;
    try_add_assign(x, residual)
}

fail_fast!(
    /// Fail-fast [`try_feed_forward`].
    pub fn feed_forward(
        x: &mut MatrixViewMut<'_>,
        residual: &MatrixView<'_>,
        weights: &FeedForwardWeights<'_>,
        scratch: &mut FeedForwardScratch<'_>,
        config: &Config,
    ) => try_feed_forward
);
