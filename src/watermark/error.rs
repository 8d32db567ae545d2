// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the watermark pipeline.
//!
//! [`WatermarkError`] covers configuration, codec, key vault and plugin
//! resolution failures. A watermark that simply does not match is never an
//! error: detection reports it through its status and match ratio.

use thiserror::Error;

use crate::codec::CodecError;

/// Errors that can occur while generating, embedding or detecting a watermark.
#[derive(Debug, Error)]
pub enum WatermarkError {
    /// Missing or malformed configuration, including an unknown codec key.
    #[error("configuration error: {0}")]
    Config(String),
    /// Error correction or cipher failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The payload has no bits, so there is nothing to embed.
    #[error("watermark payload is empty")]
    EmptyPayload,
    /// The key vault cannot be opened (no master secret).
    #[error("key vault unavailable: {0}")]
    VaultUnavailable(String),
    /// The key vault exists but cannot be decrypted or parsed.
    #[error("key vault corrupted: {0}")]
    VaultCorrupted(String),
    /// A configured plugin stage id is not registered.
    #[error("unknown plugin stage: {0}")]
    UnknownStage(String),
    /// File I/O failure at the pipeline boundary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A whitelist or tree document failed to parse.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<toml::de::Error> for WatermarkError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WatermarkError>;
