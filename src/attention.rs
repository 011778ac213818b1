// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Multi-head causal self-attention.
//!
//! Pipeline over a `D x S` activation `x` (`S = D`, see [`Config::seq_len`]):
//!
//! 1. `layer_norm(x)`
//! 2. `qkv = attn_weight @ x + attn_bias`, a `3D x S` buffer holding Q in rows
//!    `[0, D)`, K in `[D, 2D)`, V in `[2D, 3D)`
//! 3. per head `h`, with `a = D / H` and row offset `a*h` inside each region:
//!    `scores = K_h^T @ Q_h / sqrt(a)`, transposed, causal softmax,
//!    then `V_h @ scores` into rows `[a*h, a*h + a)` of `heads`
//! 4. `x = proj_weight @ heads + proj_bias + residual`
//!
//! Heads share no data: each reads its own row blocks of `qkv` and writes a
//! disjoint row block of `heads`. Only `scores` and `col_sums` are reused
//! from one head to the next.

use log::trace;

use crate::config::Config;
use crate::error::{ContractViolation, Result, fail_fast};
use crate::layers::try_layer_norm;
use crate::matrix::{MatrixView, MatrixViewMut, Order, Scalar};
use crate::ops::{divide_scalar, try_add_assign, try_add_bias, try_dot};
use crate::softmax::try_causal_softmax;

/// Read-only parameters of the attention block.
///
/// Shapes for `D = embed_dim`:
/// - `ln_weight`, `ln_bias`: `D x 1`
/// - `attn_weight`: `3D x D` (Q, K, V projections stacked by rows),
///   `attn_bias`: `3D x 1`
/// - `proj_weight`: `D x D`, `proj_bias`: `D x 1`
#[derive(Clone, Copy, Debug)]
pub struct AttentionWeights<'a> {
    pub ln_weight: MatrixView<'a>,
    pub ln_bias: MatrixView<'a>,
    pub attn_weight: MatrixView<'a>,
    pub attn_bias: MatrixView<'a>,
    pub proj_weight: MatrixView<'a>,
    pub proj_bias: MatrixView<'a>,
}

impl AttentionWeights<'_> {
    pub fn validate(&self, config: &Config) -> Result<()> {
        let d = config.embed_dim;
        let qkv = config.qkv_dim();
        self.ln_weight.layout().expect_shape("self_attention.ln_weight", d, 1)?;
        self.ln_bias.layout().expect_shape("self_attention.ln_bias", d, 1)?;
        self.attn_weight.layout().expect_shape("self_attention.attn_weight", qkv, d)?;
        self.attn_bias.layout().expect_shape("self_attention.attn_bias", qkv, 1)?;
        self.proj_weight.layout().expect_shape("self_attention.proj_weight", d, d)?;
        self.proj_bias.layout().expect_shape("self_attention.proj_bias", d, 1)
    }
}

/// Caller-owned intermediates of the attention block.
///
/// - `qkv`: `3D x S`, row-major (heads are sliced out by rows)
/// - `scores`: `S x S`
/// - `col_sums`: `1 x S`, softmax normalizers
/// - `heads`: `D x S`, row-major, concatenated head outputs
#[derive(Debug)]
pub struct AttentionScratch<'a> {
    pub qkv: MatrixViewMut<'a>,
    pub scores: MatrixViewMut<'a>,
    pub col_sums: MatrixViewMut<'a>,
    pub heads: MatrixViewMut<'a>,
}

impl AttentionScratch<'_> {
    pub fn validate(&self, config: &Config) -> Result<()> {
        let (d, s) = (config.embed_dim, config.seq_len());
        self.qkv.layout().expect_shape("self_attention.qkv", config.qkv_dim(), s)?;
        self.scores.layout().expect_shape("self_attention.scores", s, s)?;
        self.col_sums.layout().expect_shape("self_attention.col_sums", 1, s)?;
        self.heads.layout().expect_shape("self_attention.heads", d, s)?;
        for (op, layout) in [
            ("self_attention.qkv", self.qkv.layout()),
            ("self_attention.heads", self.heads.layout()),
        ] {
            if layout.order() != Order::RowMajor {
                return Err(ContractViolation::NotRowMajor { op, layout });
            }
        }
        Ok(())
    }
}

/// Scaled dot-product attention for one head, written into `out`.
fn attend_head(
    q: &MatrixView<'_>,
    k: &MatrixView<'_>,
    v: &MatrixView<'_>,
    scores: &mut MatrixViewMut<'_>,
    col_sums: &mut MatrixViewMut<'_>,
    out: &mut MatrixViewMut<'_>,
) -> Result<()> {
    let head_dim = q.rows();
    let seq_len = q.cols();
    // Local reborrow: the transpose below must not leak into the next head.
    let mut scores = scores.reborrow();

    try_dot(&k.t(), q, &mut scores)?;
    divide_scalar(&mut scores, (head_dim as Scalar).sqrt());
    scores.transpose();
    try_causal_softmax(&mut scores, col_sums, seq_len)?;
    try_dot(v, &scores.as_view(), out)
}

/// Multi-head causal self-attention block, in place on `x` (`D x S`).
///
/// `residual` must be an untouched copy of `x` as it was before the call.
pub fn try_self_attention(
    x: &mut MatrixViewMut<'_>,
    residual: &MatrixView<'_>,
    weights: &AttentionWeights<'_>,
    scratch: &mut AttentionScratch<'_>,
    config: &Config,
) -> Result<()> {
    config.validate()?;
    let (d, s) = (config.embed_dim, config.seq_len());
    x.layout().expect_shape("self_attention.x", d, s)?;
    residual.layout().expect_shape("self_attention.residual", d, s)?;
    weights.validate(config)?;
    scratch.validate(config)?;
    trace!(
        "self_attention: x={} heads={} head_dim={}",
        x.layout(),
        config.n_heads,
        config.head_dim()
    );

    try_layer_norm(x, &weights.ln_weight, &weights.ln_bias)?;

    try_dot(&weights.attn_weight, &x.as_view(), &mut scratch.qkv)?;
    try_add_bias(&mut scratch.qkv, &weights.attn_bias)?;

    let adim = config.head_dim();
    let qkv = scratch.qkv.as_view();
    for (h, mut head_out) in scratch.heads.try_row_blocks_mut(adim)?.enumerate() {
        let q = qkv.try_row_block(adim * h, adim)?;
        let k = qkv.try_row_block(d + adim * h, adim)?;
        let v = qkv.try_row_block(2 * d + adim * h, adim)?;
        attend_head(
            &q,
            &k,
            &v,
            &mut scratch.scores,
            &mut scratch.col_sums,
            &mut head_out,
        )?;
    }

    try_dot(&weights.proj_weight, &scratch.heads.as_view(), x)?;
    try_add_bias(x, &weights.proj_bias)?;
    try_add_assign(x, residual)
}

fail_fast!(
    /// Fail-fast [`try_self_attention`].
    pub fn self_attention(
        x: &mut MatrixViewMut<'_>,
        residual: &MatrixView<'_>,
        weights: &AttentionWeights<'_>,
        scratch: &mut AttentionScratch<'_>,
        config: &Config,
    ) => try_self_attention
);

#[cfg(test)]
mod tests {
    use super::*;

    struct Buffers {
        ln_w: Vec<f32>,
        ln_b: Vec<f32>,
        attn_w: Vec<f32>,
        attn_b: Vec<f32>,
        proj_w: Vec<f32>,
        proj_b: Vec<f32>,
        qkv: Vec<f32>,
        scores: Vec<f32>,
        col_sums: Vec<f32>,
        heads: Vec<f32>,
    }

    impl Buffers {
        fn new(config: &Config, fill: impl Fn(usize) -> f32) -> Self {
            let (d, s) = (config.embed_dim, config.seq_len());
            let q = config.qkv_dim();
            let make = |n: usize, off: usize| (0..n).map(|i| fill(i + off)).collect::<Vec<_>>();
            Self {
                ln_w: vec![1.0; d],
                ln_b: vec![0.0; d],
                attn_w: make(q * d, 0),
                attn_b: make(q, 1000),
                proj_w: make(d * d, 2000),
                proj_b: make(d, 3000),
                qkv: vec![0.0; q * s],
                scores: vec![0.0; s * s],
                col_sums: vec![0.0; s],
                heads: vec![0.0; d * s],
            }
        }

        fn split(&mut self, config: &Config) -> (AttentionWeights<'_>, AttentionScratch<'_>) {
            let (d, s) = (config.embed_dim, config.seq_len());
            let q = config.qkv_dim();
            (
                AttentionWeights {
                    ln_weight: MatrixView::new(&self.ln_w, d, 1),
                    ln_bias: MatrixView::new(&self.ln_b, d, 1),
                    attn_weight: MatrixView::new(&self.attn_w, q, d),
                    attn_bias: MatrixView::new(&self.attn_b, q, 1),
                    proj_weight: MatrixView::new(&self.proj_w, d, d),
                    proj_bias: MatrixView::new(&self.proj_b, d, 1),
                },
                AttentionScratch {
                    qkv: MatrixViewMut::new(&mut self.qkv, q, s),
                    scores: MatrixViewMut::new(&mut self.scores, s, s),
                    col_sums: MatrixViewMut::new(&mut self.col_sums, 1, s),
                    heads: MatrixViewMut::new(&mut self.heads, d, s),
                },
            )
        }
    }

    #[test]
    fn test_zero_projection_is_residual() {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = Config::tiny();
        let (d, s) = (config.embed_dim, config.seq_len());
        let mut bufs = Buffers::new(&config, |i| (i as f32 * 0.1).cos() * 0.2);
        bufs.proj_w.fill(0.0);
        bufs.proj_b.fill(0.0);
        let input: Vec<f32> = (0..d * s).map(|i| i as f32 - 3.0).collect();
        let mut x = input.clone();

        let (weights, mut scratch) = bufs.split(&config);
        self_attention(
            &mut MatrixViewMut::new(&mut x, d, s),
            &MatrixView::new(&input, d, s),
            &weights,
            &mut scratch,
            &config,
        );
        assert_eq!(x, input);
    }

    #[test]
    fn test_scores_layout_restored_after_heads() {
        let config = Config::tiny();
        let (d, s) = (config.embed_dim, config.seq_len());
        let mut bufs = Buffers::new(&config, |i| ((i % 7) as f32 - 3.0) * 0.05);
        let input: Vec<f32> = (0..d * s).map(|i| (i as f32).sin()).collect();
        let mut x = input.clone();

        let (weights, mut scratch) = bufs.split(&config);
        let before = scratch.scores.layout();
        self_attention(
            &mut MatrixViewMut::new(&mut x, d, s),
            &MatrixView::new(&input, d, s),
            &weights,
            &mut scratch,
            &config,
        );
        assert_eq!(scratch.scores.layout(), before);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_col_major_qkv_rejected_before_any_write() {
        let config = Config::tiny();
        let (d, s) = (config.embed_dim, config.seq_len());
        let mut bufs = Buffers::new(&config, |_| 0.5);
        let input = vec![1.0; d * s];
        let mut x = input.clone();
        let q = config.qkv_dim();
        let (weights, mut scratch) = bufs.split(&config);
        let mut qkv_t = vec![0.0; q * s];
        scratch.qkv = MatrixViewMut::new(&mut qkv_t, s, q).t();

        let result = try_self_attention(
            &mut MatrixViewMut::new(&mut x, d, s),
            &MatrixView::new(&input, d, s),
            &weights,
            &mut scratch,
            &config,
        );
        assert!(matches!(
            result,
            Err(ContractViolation::NotRowMajor { op: "self_attention.qkv", .. })
        ));
        assert_eq!(x, input);
    }

    #[test]
    #[should_panic(expected = "self_attention.attn_weight")]
    fn test_wrong_weight_shape_panics() {
        let config = Config::tiny();
        let (d, s) = (config.embed_dim, config.seq_len());
        let mut bufs = Buffers::new(&config, |_| 0.0);
        let input = vec![0.0; d * s];
        let mut x = input.clone();
        let short = vec![0.0; d * d];
        let (mut weights, mut scratch) = bufs.split(&config);
        weights.attn_weight = MatrixView::new(&short, d, d);
        self_attention(
            &mut MatrixViewMut::new(&mut x, d, s),
            &MatrixView::new(&input, d, s),
            &weights,
            &mut scratch,
            &config,
        );
    }
}
