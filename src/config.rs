// SPDX-License-Identifier: CC-BY-NC-SA-4.0
// Copyright (c) 2025-2026 fumi-engineer

//! Block configuration.
//!
//! Shapes are fixed at build time. Every buffer a block touches is sized from
//! these three numbers, so they are validated once, up front, and the blocks
//! only check that the buffers they are handed agree with them.

use log::debug;

use crate::error::{ContractViolation, Result};

/// Embedding dimension `D`.
pub const EMBED_DIM: usize = 8;
/// Feed-forward expansion factor: the hidden layer is `FFN_EXPANSION * D` wide.
pub const FFN_EXPANSION: usize = 4;
/// Number of attention heads `H`. Must divide [`EMBED_DIM`].
pub const N_HEADS: usize = 2;
/// Added to the layer-norm variance before the square root.
pub const LAYER_NORM_EPS: f32 = 1e-5;

/// Block hyperparameters.
///
/// Key relationships:
/// - `head_dim() = embed_dim / n_heads`, exact division required.
/// - `ffn_dim() = embed_dim * ffn_expansion`.
/// - `seq_len() = embed_dim`: attention runs over as many positions as there
///   are embedding features, so every activation is `D x D`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub embed_dim: usize,
    pub n_heads: usize,
    pub ffn_expansion: usize,
}

impl Config {
    pub const DEFAULT: Config = Config {
        embed_dim: EMBED_DIM,
        n_heads: N_HEADS,
        ffn_expansion: FFN_EXPANSION,
    };

    /// Minimal config for unit tests.
    pub const fn tiny() -> Self {
        Self {
            embed_dim: 4,
            n_heads: 2,
            ffn_expansion: FFN_EXPANSION,
        }
    }

    pub fn head_dim(&self) -> usize {
        self.embed_dim / self.n_heads
    }

    pub fn ffn_dim(&self) -> usize {
        self.embed_dim * self.ffn_expansion
    }

    pub fn seq_len(&self) -> usize {
        self.embed_dim
    }

    /// Fused Q/K/V projection height.
    pub fn qkv_dim(&self) -> usize {
        3 * self.embed_dim
    }

    pub fn validate(&self) -> Result<()> {
        let reason = if self.embed_dim == 0 {
            Some("embed_dim must be > 0".to_string())
        } else if self.n_heads == 0 {
            Some("n_heads must be > 0".to_string())
        } else if self.embed_dim % self.n_heads != 0 {
            Some(format!(
                "embed_dim {} is not divisible by n_heads {}",
                self.embed_dim, self.n_heads
            ))
        } else if self.ffn_expansion == 0 {
            Some("ffn_expansion must be > 0".to_string())
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ContractViolation::InvalidConfig { reason });
        }
        debug!(
            "config ok: D={} H={} head_dim={} ffn_dim={}",
            self.embed_dim,
            self.n_heads,
            self.head_dim(),
            self.ffn_dim()
        );
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
