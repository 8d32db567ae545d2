// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! # codemark-core
//!
//! Ownership watermarks for source code. A bit payload derived from project
//! identity is hidden in a syntax tree by choosing between equivalent
//! spellings at whitelisted sites:
//!
//! - **Names**: a whitelisted identifier stays as written for bit 0 and is
//!   re-cased (camelCase / PascalCase, optionally with a prefix or suffix)
//!   for bit 1.
//! - **Loops**: a single-expression loop stays a loop for bit 0 and becomes a
//!   comprehension for bit 1.
//!
//! The payload is protected by Hamming(7,4) or Reed-Solomon error correction
//! and optionally sealed with AES-256-GCM-SIV. Parsing source text into a
//! [`SyntaxTree`] and printing it back is left to an external collaborator;
//! trees are exchanged as JSON.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use codemark_core::{detect_tree, embed_tree, StageRegistry, WatermarkConfig, Whitelist};
//!
//! let config = WatermarkConfig::new("Acme", 2024, "abcd-1234");
//! let whitelist = Whitelist::with_names(["total"], true);
//! let outcome = embed_tree(&tree, &config, &whitelist, None, &StageRegistry::with_builtins()).unwrap();
//! let result = detect_tree(&outcome.tree, &config, &whitelist, None).unwrap();
//! assert_eq!(result.status, codemark_core::DetectionStatus::Detected);
//! ```

pub mod codec;
pub mod syntax;
pub mod watermark;

pub use codec::crypto::CipherKey;
pub use codec::{CodecError, ErrorCorrection};
pub use syntax::{SourceSpan, Statement, SyntaxTree};
pub use watermark::{detect_tree, detect_trees, embed_tree, resolve_key};
pub use watermark::{ChangeLogEntry, DetectionResult, DetectionStatus, EmbedOutcome, Recovery};
pub use watermark::{FileKeyVault, KeyRole, KeySource, StageRegistry, TreeStage};
pub use watermark::{WatermarkConfig, WatermarkError, WatermarkPayload, Whitelist};
