// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Allocation-free forward pass of one transformer decoder block.
//!
//! Public API facade for the `decoder-block` crate. All internal modules are
//! private; this file is the sole public boundary.
//!
//! # Module organization
//! - `matrix`    -- MatrixView / MatrixViewMut over borrowed buffers, O(1) transpose
//! - `ops`       -- dot, add, bias broadcast, scalar divide, exp, ReLU
//! - `softmax`   -- causal masked softmax over columns
//! - `layers`    -- layer norm and the feed-forward block
//! - `attention` -- multi-head causal self-attention
//! - `block`     -- attention + feed-forward with residual snapshots
//! - `config`    -- static dimensions and their relationships
//! - `error`     -- ContractViolation, the fail-fast diagnostic
//! - `loader`    -- CSV text to an owned buffer, outside the arithmetic core
//!
//! # Memory
//! Nothing under `ops`, `softmax`, `layers`, `attention` or `block` allocates.
//! Every weight, activation and scratch buffer is owned by the caller and
//! borrowed for the duration of one call.

#![deny(unsafe_code)]
#![allow(clippy::needless_range_loop)]

mod attention;
mod block;
mod config;
mod error;
mod layers;
mod loader;
mod matrix;
mod ops;
mod softmax;

// ---- Public API re-exports (facade pattern) ----
// Users write `decoder_block::MatrixView`, not `decoder_block::matrix::MatrixView`.

pub use attention::{AttentionScratch, AttentionWeights, self_attention, try_self_attention};
pub use block::{BlockScratch, BlockWeights, decoder_block, try_decoder_block, validate_block};
pub use config::{Config, EMBED_DIM, FFN_EXPANSION, LAYER_NORM_EPS, N_HEADS};
pub use error::{ContractViolation, Result};
pub use layers::{
    FeedForwardScratch, FeedForwardWeights, feed_forward, layer_norm, try_feed_forward,
    try_layer_norm,
};
pub use loader::{LoadError, MatrixBuffer, parse_csv};
pub use matrix::{Layout, MatrixView, MatrixViewMut, Order, Scalar};
pub use ops::{
    add, add_assign, add_bias, divide_scalar, dot, exp_inplace, relu_inplace, try_add,
    try_add_assign, try_add_bias, try_dot,
};
pub use softmax::{causal_softmax, try_causal_softmax};
