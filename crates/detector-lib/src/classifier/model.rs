//! Classifier weights loading
//!
//! The model is a plain-text resource of 13 whitespace-separated floats in
//! the order `scale[4] mean[4] coefficient[4] intercept`, produced by an
//! offline training pipeline. It is read once at startup; a missing or short
//! file must abort the process, so every failure here is typed and fatal to
//! the caller.

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::FEATURE_COUNT;

/// Tokens a weights resource must carry: three per-feature arrays plus the
/// intercept
pub const WEIGHT_TOKENS: usize = 3 * FEATURE_COUNT + 1;

/// Why a weights resource could not be loaded
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read weights file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("weights file has {found} tokens, expected at least {WEIGHT_TOKENS}")]
    NotEnoughTokens { found: usize },

    #[error("weights token {index} is not a number: {token:?}")]
    InvalidToken { index: usize, token: String },
}

/// Immutable standardized-linear model
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierModel {
    /// Per-feature standardization divisor
    pub scale: [f64; FEATURE_COUNT],
    /// Per-feature standardization offset
    pub mean: [f64; FEATURE_COUNT],
    /// Per-feature weight
    pub coefficients: [f64; FEATURE_COUNT],
    pub intercept: f64,
}

impl ClassifierModel {
    /// Read and parse a weights resource.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse the first 13 whitespace-separated tokens; anything after them is
    /// ignored.
    pub fn parse(input: &str) -> Result<Self, ModelError> {
        let tokens: Vec<&str> = input.split_whitespace().take(WEIGHT_TOKENS).collect();
        if tokens.len() < WEIGHT_TOKENS {
            return Err(ModelError::NotEnoughTokens {
                found: tokens.len(),
            });
        }

        let mut values = [0f64; WEIGHT_TOKENS];
        for (index, token) in tokens.iter().enumerate() {
            values[index] = token.parse().map_err(|_| ModelError::InvalidToken {
                index,
                token: (*token).to_string(),
            })?;
        }

        let mut scale = [0f64; FEATURE_COUNT];
        let mut mean = [0f64; FEATURE_COUNT];
        let mut coefficients = [0f64; FEATURE_COUNT];
        scale.copy_from_slice(&values[..FEATURE_COUNT]);
        mean.copy_from_slice(&values[FEATURE_COUNT..2 * FEATURE_COUNT]);
        coefficients.copy_from_slice(&values[2 * FEATURE_COUNT..3 * FEATURE_COUNT]);

        Ok(Self {
            scale,
            mean,
            coefficients,
            intercept: values[WEIGHT_TOKENS - 1],
        })
    }
}
