// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Watermark embedding and detection.
//!
//! - **Payload** (`payload`): project identity -> error correction ->
//!   optional encryption -> optional permutation.
//! - **Embedding** (`embed`): spends payload bits on whitelisted naming and
//!   loop sites while walking the tree, wrapping around when the payload runs
//!   out.
//! - **Detection** (`detect`): reads the bits back from an observed tree and
//!   scores them against a freshly generated payload.
//!
//! `embed_tree` / `detect_tree` tie these together with configuration,
//! plugin stages and resolved keys.

pub mod config;
pub mod cursor;
pub mod detect;
pub mod embed;
pub mod error;
pub mod naming;
pub mod payload;
pub mod permute;
pub mod plugin;
mod pipeline;
pub mod vault;
pub mod whitelist;

pub use config::WatermarkConfig;
pub use detect::{DetectionResult, DetectionStatus, Recovery};
pub use embed::{ChangeLogEntry, EmbedOutcome, SiteKind};
pub use error::WatermarkError;
pub use payload::WatermarkPayload;
pub use pipeline::{detect_tree, detect_trees, embed_tree};
pub use plugin::{PluginError, PluginPipeline, StageRegistry, TreeStage};
pub use vault::{resolve_key, FileKeyVault, KeyRole, KeySource};
pub use whitelist::Whitelist;
