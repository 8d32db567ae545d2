// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Embedding engine.
//!
//! One pass over the tree in source order. Every whitelisted site takes one
//! bit from the [`BitCursor`]:
//!
//! - declaration and store names: bit 0 keeps the name, bit 1 applies a
//!   naming transform (see [`super::naming`]);
//! - loops whose body is a single expression statement: bit 1 turns the loop
//!   into a comprehension with a fresh `_`-prefixed binding, bit 0 keeps it;
//! - statement-level comprehensions: bit 1 keeps them, bit 0 turns them back
//!   into the equivalent loop.
//!
//! Loop bindings are not store sites, and only stores are renamed: reads of
//! a renamed name are left alone. Bit order is strictly traversal order, so
//! the detector walks the tree the same way.

use std::collections::BTreeSet;
use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

use super::cursor::BitCursor;
use super::error::Result;
use super::naming;
use super::payload::WatermarkPayload;
use super::whitelist::Whitelist;
use crate::syntax::{Comprehension, Expr, Loop, Other, SourceSpan, Statement, SyntaxTree};

/// What kind of site a change was made at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    Declaration,
    Store,
    Loop,
    Comprehension,
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Declaration => "function",
            Self::Store => "variable",
            Self::Loop => "loop",
            Self::Comprehension => "comprehension",
        })
    }
}

/// One rewrite, for human review before the tree is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeLogEntry {
    pub site: SiteKind,
    pub span: SourceSpan,
    pub original: String,
    pub new: String,
}

impl fmt::Display for ChangeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}: {} -> {}",
            self.span.line, self.span.column, self.site, self.original, self.new
        )
    }
}

/// Result of one embedding pass.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub tree: SyntaxTree,
    pub changes: Vec<ChangeLogEntry>,
    /// Bits taken from the cursor, counting reuse after wraparound.
    pub bits_consumed: usize,
    pub wraps: usize,
}

/// Embed `payload` into `tree` at the sites `whitelist` allows.
pub fn embed(
    tree: &SyntaxTree,
    payload: &WatermarkPayload,
    whitelist: &Whitelist,
    alternate_naming: bool,
) -> Result<EmbedOutcome> {
    embed_with_rng(tree, payload, whitelist, alternate_naming, ChaCha20Rng::from_entropy())
}

/// [`embed`] with a caller-supplied RNG for alternate naming.
pub fn embed_with_rng<R: Rng>(
    tree: &SyntaxTree,
    payload: &WatermarkPayload,
    whitelist: &Whitelist,
    alternate_naming: bool,
    rng: R,
) -> Result<EmbedOutcome> {
    let mut embedder = Embedder {
        cursor: BitCursor::new(payload)?,
        whitelist,
        loops: whitelist.loops_enabled(),
        alternate_naming,
        rng,
        reserved: tree.names().into_iter().chain(whitelist.names().into_iter().map(String::from)).collect(),
        taken: tree.names(),
        changes: Vec::new(),
    };

    let mut tree = tree.clone();
    embedder.visit_block(&mut tree.body);

    tracing::info!(
        changes = embedder.changes.len(),
        bits = embedder.cursor.consumed(),
        payload_len = payload.len(),
        wraps = embedder.cursor.wraps(),
        "watermark embedded"
    );

    Ok(EmbedOutcome {
        tree,
        bits_consumed: embedder.cursor.consumed(),
        wraps: embedder.cursor.wraps(),
        changes: embedder.changes,
    })
}

struct Embedder<'a, R> {
    cursor: BitCursor<'a>,
    whitelist: &'a Whitelist,
    loops: bool,
    alternate_naming: bool,
    rng: R,
    /// Identifiers of the input tree and the whitelist. Bit-1 renames avoid
    /// them where the naming mode leaves a choice.
    reserved: BTreeSet<String>,
    /// Names in use, so fresh loop bindings never collide.
    taken: BTreeSet<String>,
    changes: Vec<ChangeLogEntry>,
}

impl<R: Rng> Embedder<'_, R> {
    fn visit_block(&mut self, body: &mut [Statement]) {
        for stmt in body {
            self.visit(stmt);
        }
    }

    fn visit(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Declaration(d) => {
                self.rename_site(SiteKind::Declaration, &mut d.name, d.span);
                self.visit_block(&mut d.body);
            }
            Statement::Store(s) => self.rename_site(SiteKind::Store, &mut s.target, s.span),
            Statement::Loop(l) => {
                if self.loops && l.single_expression().is_some() && self.cursor.next_bit() == 1 {
                    let comp = self.to_comprehension(l);
                    *stmt = Statement::Comprehension(comp);
                } else {
                    self.visit_block(&mut l.body);
                }
            }
            Statement::Comprehension(c) => {
                if self.loops && self.cursor.next_bit() == 0 {
                    let restored = self.to_loop(c);
                    *stmt = Statement::Loop(restored);
                }
            }
            Statement::Other(o) => self.visit_block(&mut o.body),
        }
    }

    fn rename_site(&mut self, site: SiteKind, name: &mut String, span: SourceSpan) {
        if !self.whitelist.is_renamable(name) {
            if let Some((original, bit)) = self.whitelist.lookup(name) {
                tracing::warn!(
                    line = span.line,
                    name = name.as_str(),
                    original,
                    bit,
                    "identifier is not a site but reads as a watermark bit"
                );
            }
            return;
        }
        let bit = self.cursor.next_bit();
        let renamed = if bit == 1 { self.bit_one_name(name) } else { name.clone() };
        tracing::debug!(%site, line = span.line, bit, from = name.as_str(), to = renamed.as_str(), "site visited");
        if renamed != *name {
            self.changes.push(ChangeLogEntry {
                site,
                span,
                original: name.clone(),
                new: renamed.clone(),
            });
            self.taken.insert(renamed.clone());
            *name = renamed;
        }
    }

    fn bit_one_name(&mut self, name: &str) -> String {
        let renamed = naming::encode(name, 1, self.alternate_naming, &mut self.rng);
        if !self.reserved.contains(&renamed) {
            return renamed;
        }
        if self.alternate_naming {
            let mut free: Vec<String> =
                naming::candidates(name).into_iter().filter(|c| !self.reserved.contains(c)).collect();
            if !free.is_empty() {
                let pick = self.rng.gen_range(0..free.len() as u32) as usize;
                return free.swap_remove(pick);
            }
        }
        tracing::warn!(from = name, to = renamed.as_str(), "renamed site collides with an existing identifier");
        renamed
    }

    fn fresh_binding(&mut self, binding: &str) -> String {
        let base = format!("_{binding}");
        let mut candidate = base.clone();
        let mut n = 1;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}{n}");
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    /// Caller guarantees `l.single_expression()` is `Some`.
    fn to_comprehension(&mut self, l: &Loop) -> Comprehension {
        let binding = self.fresh_binding(&l.binding);
        let mut element = l.single_expression().cloned().unwrap_or_else(|| Expr::name(&l.binding));
        element.rename(&l.binding, &binding);

        tracing::debug!(
            line = l.span.line,
            from = l.binding.as_str(),
            to = binding.as_str(),
            "loop rewritten as comprehension"
        );
        self.changes.push(ChangeLogEntry {
            site: SiteKind::Loop,
            span: l.span,
            original: format!("for {} in {}", l.binding, l.iterable),
            new: format!("[{element} for {binding} in {}]", l.iterable),
        });

        Comprehension {
            binding,
            iterable: l.iterable.clone(),
            element,
            span: l.span,
        }
    }

    fn to_loop(&mut self, c: &Comprehension) -> Loop {
        tracing::debug!(line = c.span.line, "comprehension rewritten as loop");
        self.changes.push(ChangeLogEntry {
            site: SiteKind::Comprehension,
            span: c.span,
            original: format!("[{} for {} in {}]", c.element, c.binding, c.iterable),
            new: format!("for {} in {}", c.binding, c.iterable),
        });
        Loop {
            binding: c.binding.clone(),
            iterable: c.iterable.clone(),
            body: vec![Statement::Other(Other::expression(c.element.clone(), c.span))],
            span: c.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Declaration, Store};

    fn store(name: &str, value: &str, line: u32) -> Statement {
        Statement::Store(Store {
            target: name.into(),
            value: Expr::literal(value),
            span: SourceSpan::new(line, 1),
        })
    }

    fn print_loop(binding: &str, line: u32) -> Statement {
        Statement::Loop(Loop {
            binding: binding.into(),
            iterable: Expr::name("items"),
            body: vec![Statement::Other(Other::expression(
                Expr::call("print", vec![Expr::name(binding)]),
                SourceSpan::new(line + 1, 5),
            ))],
            span: SourceSpan::new(line, 1),
        })
    }

    fn seeded() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(1)
    }

    #[test]
    fn renames_stores_by_bit() {
        let tree = SyntaxTree::new(vec![store("total", "0", 1), store("total", "1", 2)]);
        let payload: WatermarkPayload = "10".parse().unwrap();
        let wl = Whitelist::with_names(["total"], false);
        let out = embed_with_rng(&tree, &payload, &wl, false, seeded()).unwrap();

        let Statement::Store(first) = &out.tree.body[0] else { panic!() };
        let Statement::Store(second) = &out.tree.body[1] else { panic!() };
        assert_eq!(first.target, "Total");
        assert_eq!(second.target, "total");
        assert_eq!(out.changes.len(), 1);
        assert_eq!(out.changes[0].to_string(), "1:1 variable: total -> Total");
        assert_eq!(out.bits_consumed, 2);
        assert_eq!(out.wraps, 0);
    }

    #[test]
    fn alternate_naming_avoids_existing_identifiers() {
        let tree = SyntaxTree::new(vec![store("Total", "0", 1), store("total", "0", 2), store("total", "1", 3)]);
        let payload: WatermarkPayload = "1".parse().unwrap();
        let wl = Whitelist::with_names(["total"], false);

        for seed in 0..32 {
            let out = embed_with_rng(&tree, &payload, &wl, true, ChaCha20Rng::seed_from_u64(seed)).unwrap();
            assert_eq!(out.bits_consumed, 2, "pre-existing Total is not a site");
            let targets: Vec<&str> = out
                .tree
                .body
                .iter()
                .map(|s| match s {
                    Statement::Store(s) => s.target.as_str(),
                    _ => unreachable!(),
                })
                .collect();
            assert_eq!(targets[0], "Total");
            for renamed in &targets[1..] {
                assert_ne!(*renamed, "Total");
                assert!(naming::candidates("total").contains(*renamed));
            }
        }
    }

    #[test]
    fn plain_naming_still_carries_colliding_bit() {
        let tree = SyntaxTree::new(vec![store("Total", "0", 1), store("total", "0", 2)]);
        let payload: WatermarkPayload = "1".parse().unwrap();
        let wl = Whitelist::with_names(["total"], false);
        let out = embed_with_rng(&tree, &payload, &wl, false, seeded()).unwrap();

        let Statement::Store(renamed) = &out.tree.body[1] else { panic!() };
        assert_eq!(renamed.target, "Total");
        assert_eq!(out.bits_consumed, 1);
    }

    #[test]
    fn declaration_before_body() {
        let tree = SyntaxTree::new(vec![Statement::Declaration(Declaration {
            name: "compute_total".into(),
            params: vec!["items".into()],
            body: vec![store("running_sum", "0", 2)],
            span: SourceSpan::new(1, 1),
        })]);
        let payload: WatermarkPayload = "10".parse().unwrap();
        let wl = Whitelist::with_names(["compute_total", "running_sum"], false);
        let out = embed_with_rng(&tree, &payload, &wl, false, seeded()).unwrap();

        let Statement::Declaration(d) = &out.tree.body[0] else { panic!() };
        assert_eq!(d.name, "computeTotal");
        let Statement::Store(s) = &d.body[0] else { panic!() };
        assert_eq!(s.target, "running_sum");
        assert_eq!(out.changes[0].site, SiteKind::Declaration);
    }

    #[test]
    fn loop_becomes_comprehension_on_one() {
        let tree = SyntaxTree::new(vec![print_loop("item", 1), print_loop("item", 3)]);
        let payload: WatermarkPayload = "10".parse().unwrap();
        let wl = Whitelist::with_names(Vec::<String>::new(), true);
        let out = embed_with_rng(&tree, &payload, &wl, false, seeded()).unwrap();

        let Statement::Comprehension(c) = &out.tree.body[0] else { panic!("expected comprehension") };
        assert_eq!(c.binding, "_item");
        assert_eq!(c.element, Expr::call("print", vec![Expr::name("_item")]));
        assert_eq!(c.iterable, Expr::name("items"));
        assert_eq!(c.span, SourceSpan::new(1, 1));
        assert!(matches!(out.tree.body[1], Statement::Loop(_)));
        assert_eq!(out.changes.len(), 1);
    }

    #[test]
    fn fresh_binding_avoids_collisions() {
        let tree = SyntaxTree::new(vec![store("_item", "0", 1), print_loop("item", 2)]);
        let payload: WatermarkPayload = "1".parse().unwrap();
        let wl = Whitelist::with_names(Vec::<String>::new(), true);
        let out = embed_with_rng(&tree, &payload, &wl, false, seeded()).unwrap();

        let Statement::Comprehension(c) = &out.tree.body[1] else { panic!() };
        assert_eq!(c.binding, "_item1");
    }

    #[test]
    fn multi_statement_loop_is_not_a_site() {
        let mut l = print_loop("item", 1);
        if let Statement::Loop(inner) = &mut l {
            inner.body.push(store("count", "1", 3));
        }
        let tree = SyntaxTree::new(vec![l]);
        let payload: WatermarkPayload = "1".parse().unwrap();
        let wl = Whitelist::with_names(["count"], true);
        let out = embed_with_rng(&tree, &payload, &wl, false, seeded()).unwrap();

        let Statement::Loop(l) = &out.tree.body[0] else { panic!() };
        let Statement::Store(s) = &l.body[1] else { panic!() };
        assert_eq!(s.target, "Count");
        assert_eq!(out.bits_consumed, 1);
    }

    #[test]
    fn comprehension_restored_on_zero() {
        let tree = SyntaxTree::new(vec![Statement::Comprehension(Comprehension {
            binding: "_x".into(),
            iterable: Expr::name("xs"),
            element: Expr::call("f", vec![Expr::name("_x")]),
            span: SourceSpan::new(4, 1),
        })]);
        let payload: WatermarkPayload = "0".parse().unwrap();
        let wl = Whitelist::with_names(Vec::<String>::new(), true);
        let out = embed_with_rng(&tree, &payload, &wl, false, seeded()).unwrap();

        let Statement::Loop(l) = &out.tree.body[0] else { panic!() };
        assert_eq!(l.binding, "_x");
        assert_eq!(l.single_expression(), Some(&Expr::call("f", vec![Expr::name("_x")])));
    }

    #[test]
    fn loops_untouched_when_not_whitelisted() {
        let tree = SyntaxTree::new(vec![print_loop("item", 1)]);
        let payload: WatermarkPayload = "1".parse().unwrap();
        let out = embed_with_rng(&tree, &payload, &Whitelist::default(), false, seeded()).unwrap();
        assert_eq!(out.tree, tree);
        assert_eq!(out.bits_consumed, 0);
    }

    #[test]
    fn cursor_wraps_over_many_sites() {
        let body: Vec<Statement> = (1..=20).map(|i| store("total", "0", i)).collect();
        let tree = SyntaxTree::new(body);
        let payload: WatermarkPayload = "10110010".parse().unwrap();
        let wl = Whitelist::with_names(["total"], false);
        let out = embed_with_rng(&tree, &payload, &wl, false, seeded()).unwrap();

        assert_eq!(out.bits_consumed, 20);
        assert!(out.wraps >= 2);
        let targets: Vec<&str> = out
            .tree
            .body
            .iter()
            .map(|s| match s {
                Statement::Store(s) => s.target.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(targets[8], targets[0]);
        assert_eq!(targets[0], "Total");
        assert_eq!(targets[1], "total");
    }

    #[test]
    fn empty_payload_is_an_error() {
        let tree = SyntaxTree::new(vec![store("total", "0", 1)]);
        let payload = WatermarkPayload::from_bits(Vec::new());
        let wl = Whitelist::with_names(["total"], false);
        assert!(embed(&tree, &payload, &wl, false).is_err());
    }
}
