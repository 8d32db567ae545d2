// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Tree-rewrite stages applied around embedding.
//!
//! Stages are registered under an id and resolved from the ordered id lists
//! in the configuration (`plugins.before`, `plugins.after`). The pipeline
//! runs them in exactly that order. A stage that returns an error or panics
//! is logged and skipped: the tree from before that stage goes on to the
//! next one.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

use super::error::{Result, WatermarkError};
use crate::syntax::{Statement, SyntaxTree};

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{0}")]
    Failed(String),
    #[error("stage panicked: {0}")]
    Panicked(String),
}

/// One tree -> tree transform.
pub trait TreeStage: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, tree: &SyntaxTree) -> std::result::Result<SyntaxTree, PluginError>;
}

/// Known stages by id.
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: BTreeMap<String, Arc<dyn TreeStage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in stages.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(PrefixDeclarations::default());
        registry
    }

    /// Register a stage under its own name, replacing any previous one.
    pub fn register<S: TreeStage + 'static>(&mut self, stage: S) {
        self.stages.insert(stage.name().to_string(), Arc::new(stage));
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    /// Resolve an ordered id list. Any unknown id fails the whole list.
    pub fn resolve(&self, ids: &[String]) -> Result<PluginPipeline> {
        let stages = ids
            .iter()
            .map(|id| {
                self.stages
                    .get(id)
                    .cloned()
                    .ok_or_else(|| WatermarkError::UnknownStage(id.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PluginPipeline { stages })
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stages.keys()).finish()
    }
}

/// Ordered, resolved stages.
#[derive(Clone, Default)]
pub struct PluginPipeline {
    stages: Vec<Arc<dyn TreeStage>>,
}

impl PluginPipeline {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, isolating failures.
    pub fn run(&self, mut tree: SyntaxTree) -> SyntaxTree {
        for stage in &self.stages {
            match run_stage(stage.as_ref(), &tree) {
                Ok(next) => {
                    tracing::debug!(stage = stage.name(), "plugin stage applied");
                    tree = next;
                }
                Err(error) => {
                    tracing::warn!(stage = stage.name(), %error, "plugin stage failed, skipping");
                }
            }
        }
        tree
    }
}

impl std::fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stages.iter().map(|s| s.name())).finish()
    }
}

fn run_stage(stage: &dyn TreeStage, tree: &SyntaxTree) -> std::result::Result<SyntaxTree, PluginError> {
    panic::catch_unwind(AssertUnwindSafe(|| stage.apply(tree))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(PluginError::Panicked(message))
    })
}

/// Built-in stage: prefix every declaration name with `prod_`.
#[derive(Debug, Clone)]
pub struct PrefixDeclarations {
    prefix: String,
}

impl PrefixDeclarations {
    pub const ID: &'static str = "prefix_declarations";

    fn rewrite(&self, body: &mut [Statement]) {
        for stmt in body {
            match stmt {
                Statement::Declaration(d) => {
                    if !d.name.starts_with(&self.prefix) {
                        d.name = format!("{}{}", self.prefix, d.name);
                    }
                    self.rewrite(&mut d.body);
                }
                Statement::Loop(l) => self.rewrite(&mut l.body),
                Statement::Other(o) => self.rewrite(&mut o.body),
                Statement::Store(_) | Statement::Comprehension(_) => {}
            }
        }
    }
}

impl Default for PrefixDeclarations {
    fn default() -> Self {
        Self { prefix: "prod_".to_string() }
    }
}

impl TreeStage for PrefixDeclarations {
    fn name(&self) -> &str {
        Self::ID
    }

    fn apply(&self, tree: &SyntaxTree) -> std::result::Result<SyntaxTree, PluginError> {
        let mut tree = tree.clone();
        self.rewrite(&mut tree.body);
        Ok(tree)
    }
}
