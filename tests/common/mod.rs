// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Syntax tree fixtures shared by the integration tests.

#![allow(dead_code)]

use codemark_core::syntax::{Declaration, Expr, Loop, Other, SourceSpan, Statement, Store, SyntaxTree};
use codemark_core::WatermarkConfig;

pub fn store(name: &str, value: Expr, line: u32) -> Statement {
    Statement::Store(Store { target: name.into(), value, span: SourceSpan::new(line, 5) })
}

pub fn print_loop(binding: &str, iterable: &str, line: u32) -> Statement {
    Statement::Loop(Loop {
        binding: binding.into(),
        iterable: Expr::name(iterable),
        body: vec![Statement::Other(Other::expression(
            Expr::call("print", vec![Expr::name(binding)]),
            SourceSpan::new(line + 1, 9),
        ))],
        span: SourceSpan::new(line, 5),
    })
}

/// ```text
/// def compute_total(items):
///     total = 0
///     for item in items:
///         print(item)
///     total = total + 1
///     return total
/// ```
pub fn compute_total() -> SyntaxTree {
    SyntaxTree::new(vec![Statement::Declaration(Declaration {
        name: "compute_total".into(),
        params: vec!["items".into()],
        body: vec![
            store("total", Expr::literal("0"), 2),
            print_loop("item", "items", 3),
            store("total", Expr::binary("+", Expr::name("total"), Expr::literal("1")), 5),
            Statement::Other(Other {
                label: "return".into(),
                value: Some(Expr::name("total")),
                body: Vec::new(),
                span: SourceSpan::new(6, 5),
            }),
        ],
        span: SourceSpan::new(1, 1),
    })])
}

/// `n` consecutive `total = i` stores, one site each.
pub fn many_stores(n: usize) -> SyntaxTree {
    SyntaxTree::new(
        (0..n)
            .map(|i| store("total", Expr::literal(&i.to_string()), i as u32 + 1))
            .collect(),
    )
}

/// Flip the bit carried by the `index`-th store of a [`many_stores`] tree.
pub fn flip_store(tree: &mut SyntaxTree, index: usize) {
    if let Statement::Store(s) = &mut tree.body[index] {
        s.target = if s.target == "total" { "Total".into() } else { "total".into() };
    }
}

pub fn acme() -> WatermarkConfig {
    WatermarkConfig::new("Acme", 2024, "abcd-1234")
}
