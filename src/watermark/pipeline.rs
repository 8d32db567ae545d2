// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end embed and detect entry points.
//!
//! Both paths regenerate the payload from the same configuration, which is
//! how the detector knows what to look for without any side channel.

use super::config::WatermarkConfig;
use super::detect::{self, DetectionResult};
use super::embed::{self, EmbedOutcome};
use super::error::Result;
use super::payload;
use super::plugin::StageRegistry;
use super::whitelist::Whitelist;
use crate::codec::crypto::CipherKey;
use crate::syntax::SyntaxTree;

/// Embed the configured watermark into `tree`.
///
/// `plugins.before` stages run on the input tree, `plugins.after` stages on
/// the watermarked one. `key` is the resolved embedder key; `None` leaves the
/// payload unencrypted.
///
/// # Errors
/// - [`WatermarkError::Config`](super::WatermarkError::Config) for an invalid
///   configuration or unknown codec.
/// - [`WatermarkError::UnknownStage`](super::WatermarkError::UnknownStage) if a
///   plugin id is not in `registry`.
pub fn embed_tree(
    tree: &SyntaxTree,
    config: &WatermarkConfig,
    whitelist: &Whitelist,
    key: Option<&CipherKey>,
    registry: &StageRegistry,
) -> Result<EmbedOutcome> {
    config.validate()?;
    let before = registry.resolve(&config.plugins.before)?;
    let after = registry.resolve(&config.plugins.after)?;

    let codec = config.codec()?;
    let generated = payload::generate(config, key)?;
    tracing::info!(
        payload_len = generated.payload.len(),
        %codec,
        encrypted = key.is_some(),
        order = ?generated.order,
        "watermark payload generated"
    );

    let input = before.run(tree.clone());
    let mut outcome = embed::embed(&input, &generated.payload, whitelist, config.alternate_naming)?;
    outcome.tree = after.run(outcome.tree);
    Ok(outcome)
}

/// Detect the configured watermark in `tree`.
///
/// `key` is the resolved detector key. A watermark that does not match is
/// reported in the result, not as an error.
pub fn detect_tree(
    tree: &SyntaxTree,
    config: &WatermarkConfig,
    whitelist: &Whitelist,
    key: Option<&CipherKey>,
) -> Result<DetectionResult> {
    config.validate()?;
    let expected = payload::expected(config, key)?;
    Ok(detect::detect(tree, whitelist, &expected, &config.codec()?, key))
}

/// [`detect_tree`] over many trees (in parallel with the `parallel` feature).
pub fn detect_trees(
    trees: &[SyntaxTree],
    config: &WatermarkConfig,
    whitelist: &Whitelist,
    key: Option<&CipherKey>,
) -> Result<Vec<DetectionResult>> {
    config.validate()?;
    let expected = payload::expected(config, key)?;
    Ok(detect::detect_batch(trees, whitelist, &expected, &config.codec()?, key))
}
