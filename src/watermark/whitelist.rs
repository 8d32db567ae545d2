// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Whitelist of renamable identifiers and eligible structural sites.
//!
//! Produced by an external analyzer as JSON:
//!
//! ```json
//! {
//!   "variables": [{ "name": "total", "line_number": 3 }],
//!   "functions": [{ "name": "compute_total" }],
//!   "code_sections": [{ "type": "for_loop" }]
//! }
//! ```
//!
//! Extra per-entry fields written by the analyzer are ignored.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::Result;
use super::naming;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSection {
    #[serde(alias = "type")]
    pub category: String,
}

/// Structural site categories the engines understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StructuralCategory {
    Loop,
}

impl StructuralCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "loop" | "for_loop" => Some(Self::Loop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    #[serde(default)]
    pub variables: Vec<WhitelistEntry>,
    #[serde(default)]
    pub functions: Vec<WhitelistEntry>,
    #[serde(default)]
    pub code_sections: Vec<CodeSection>,
}

impl Whitelist {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Build from plain names; `loops` enables loop-structural sites.
    pub fn with_names<I, S>(names: I, loops: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: names
                .into_iter()
                .map(|n| WhitelistEntry { name: n.into(), line_number: None })
                .collect(),
            functions: Vec::new(),
            code_sections: if loops {
                vec![CodeSection { category: "loop".into() }]
            } else {
                Vec::new()
            },
        }
    }

    fn entries(&self) -> impl Iterator<Item = &WhitelistEntry> {
        self.variables.iter().chain(&self.functions)
    }

    /// Whitelisted names, in declaration order, without duplicates.
    pub fn names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.entries()
            .map(|e| e.name.as_str())
            .filter(|n| seen.insert(*n))
            .collect()
    }

    /// Whether `name` is a renamable site when embedding.
    pub fn is_renamable(&self, name: &str) -> bool {
        self.entries().any(|e| e.name == name) && naming::is_eligible(name)
    }

    pub fn structural(&self) -> BTreeSet<StructuralCategory> {
        self.code_sections
            .iter()
            .filter_map(|s| StructuralCategory::parse(&s.category))
            .collect()
    }

    pub fn loops_enabled(&self) -> bool {
        self.structural().contains(&StructuralCategory::Loop)
    }

    /// Bit carried by an observed name. A name that is itself an eligible
    /// whitelist entry reads as bit 0 before any candidate is considered;
    /// otherwise the first entry with a matching candidate wins.
    pub fn lookup(&self, observed: &str) -> Option<(&str, u8)> {
        let names = self.names();
        if let Some(&original) = names.iter().find(|&&n| n == observed && naming::is_eligible(n)) {
            return Some((original, 0));
        }
        names
            .into_iter()
            .find_map(|original| naming::decode(original, observed).map(|bit| (original, bit)))
    }
}
