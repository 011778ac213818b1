// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! One decoder block: self-attention followed by feed-forward, each with its
//! own residual connection.
//!
//! The two sub-blocks expect a pristine copy of their input for the residual
//! add. Here that copy is taken explicitly into `scratch.residual`, a
//! caller-provided `D x S` buffer, before each sub-block runs.

use log::trace;

use crate::attention::{AttentionScratch, AttentionWeights, try_self_attention};
use crate::config::Config;
use crate::error::{Result, fail_fast};
use crate::layers::{FeedForwardScratch, FeedForwardWeights, try_feed_forward};
use crate::matrix::MatrixViewMut;

#[derive(Clone, Copy, Debug)]
pub struct BlockWeights<'a> {
    pub attention: AttentionWeights<'a>,
    pub feed_forward: FeedForwardWeights<'a>,
}

#[derive(Debug)]
pub struct BlockScratch<'a> {
    /// Snapshot of the sub-block input, `D x S`.
    pub residual: MatrixViewMut<'a>,
    pub attention: AttentionScratch<'a>,
    pub feed_forward: FeedForwardScratch<'a>,
}

/// Full decoder block forward pass, in place on `x` (`D x S`).
///
/// All weights and scratch are checked before `x` is written, so a shape
/// error never leaves `x` half-updated.
pub fn try_decoder_block(
    x: &mut MatrixViewMut<'_>,
    weights: &BlockWeights<'_>,
    scratch: &mut BlockScratch<'_>,
    config: &Config,
) -> Result<()> {
    validate_block(weights, scratch, config)?;
    x.layout()
        .expect_shape("decoder_block.x", config.embed_dim, config.seq_len())?;
    trace!("decoder_block: x={}", x.layout());

    scratch.residual.try_copy_from(&x.as_view())?;
    try_self_attention(
        x,
        &scratch.residual.as_view(),
        &weights.attention,
        &mut scratch.attention,
        config,
    )?;

    scratch.residual.try_copy_from(&x.as_view())?;
    try_feed_forward(
        x,
        &scratch.residual.as_view(),
        &weights.feed_forward,
        &mut scratch.feed_forward,
        config,
    )
}

fail_fast!(
    /// Fail-fast [`try_decoder_block`].
    pub fn decoder_block(
        x: &mut MatrixViewMut<'_>,
        weights: &BlockWeights<'_>,
        scratch: &mut BlockScratch<'_>,
        config: &Config,
    ) => try_decoder_block
);

/// Check that a buffer set can run through [`try_decoder_block`] without
/// touching any data. Useful once at startup, before the first forward pass.
pub fn validate_block(
    weights: &BlockWeights<'_>,
    scratch: &BlockScratch<'_>,
    config: &Config,
) -> Result<()> {
    config.validate()?;
    scratch
        .residual
        .layout()
        .expect_shape("decoder_block.residual", config.embed_dim, config.seq_len())?;
    weights.attention.validate(config)?;
    weights.feed_forward.validate(config)?;
    scratch.attention.validate(config)?;
    scratch.feed_forward.validate(config)
}
