// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Identifier transforms selected by a single payload bit.
//!
//! Bit 0 keeps the name. Bit 1 rewrites it to camelCase, or to PascalCase
//! when camelCase is a no-op (`total` -> `Total`). With alternate naming the
//! bit-1 form is picked at random and may gain a prefix or suffix token, so
//! the detector matches against the full candidate set instead of a single
//! expected string.

use std::collections::BTreeSet;

use rand::Rng;

/// Prefix tokens for alternate naming. The base name is capitalized after them.
pub const PREFIXES: [&str; 3] = ["my", "the", "cur"];
/// Suffix tokens for alternate naming.
pub const SUFFIXES: [&str; 3] = ["Val", "Ref", "Item"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformRule {
    Identity,
    CamelCase,
    PascalCase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affix {
    Prefix(&'static str),
    Suffix(&'static str),
}

impl TransformRule {
    pub fn apply(self, name: &str) -> String {
        match self {
            Self::Identity => name.to_string(),
            Self::CamelCase => to_camel(name),
            Self::PascalCase => to_pascal(name),
        }
    }
}

impl Affix {
    pub fn apply(self, base: &str) -> String {
        match self {
            Self::Prefix(p) => format!("{p}{}", upper_first(base)),
            Self::Suffix(s) => format!("{base}{s}"),
        }
    }

    fn all() -> impl Iterator<Item = Affix> {
        PREFIXES.into_iter().map(Affix::Prefix).chain(SUFFIXES.into_iter().map(Affix::Suffix))
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// First char upper, rest lower.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn parts(name: &str) -> impl Iterator<Item = &str> {
    name.split('_').filter(|p| !p.is_empty())
}

/// `total_amount` -> `totalAmount`. The first part is kept as is.
pub fn to_camel(name: &str) -> String {
    let mut it = parts(name);
    let mut out = it.next().unwrap_or_default().to_string();
    for part in it {
        out.push_str(&capitalize(part));
    }
    out
}

/// `total_amount` -> `TotalAmount`.
pub fn to_pascal(name: &str) -> String {
    parts(name).map(capitalize).collect()
}

/// Bit-1 rules that actually change `name`, camelCase first.
fn effective_rules(name: &str) -> Vec<TransformRule> {
    let mut rules = Vec::with_capacity(2);
    let camel = to_camel(name);
    if camel != name && !camel.is_empty() {
        rules.push(TransformRule::CamelCase);
    }
    let pascal = to_pascal(name);
    if pascal != name && !pascal.is_empty() && pascal != camel {
        rules.push(TransformRule::PascalCase);
    }
    rules
}

/// A name can carry a bit only if some bit-1 form differs from it.
pub fn is_eligible(name: &str) -> bool {
    !effective_rules(name).is_empty()
}

/// Rewrite `name` for `bit`. Ineligible names come back unchanged.
pub fn encode<R: Rng + ?Sized>(name: &str, bit: u8, alternate: bool, rng: &mut R) -> String {
    if bit == 0 {
        return TransformRule::Identity.apply(name);
    }
    let rules = effective_rules(name);
    let Some(&first) = rules.first() else {
        return name.to_string();
    };
    if !alternate {
        return first.apply(name);
    }

    let base = rules[rng.gen_range(0..rules.len() as u32) as usize].apply(name);
    let affixes: Vec<Affix> = Affix::all().collect();
    // index == affixes.len() means no affix
    match rng.gen_range(0..=affixes.len() as u32) as usize {
        i if i < affixes.len() => affixes[i].apply(&base),
        _ => base,
    }
}

/// Every name `encode(original, 1, ..)` can produce.
pub fn candidates(original: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for rule in effective_rules(original) {
        let base = rule.apply(original);
        out.extend(Affix::all().map(|a| a.apply(&base)));
        out.insert(base);
    }
    out.remove(original);
    out
}

/// Inverse of [`encode`] for one whitelist entry.
pub fn decode(original: &str, observed: &str) -> Option<u8> {
    if !is_eligible(original) {
        None
    } else if observed == original {
        Some(0)
    } else if candidates(original).contains(observed) {
        Some(1)
    } else {
        None
    }
}
