// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Syntax tree exchanged with the parser/printer collaborator.
//!
//! The tree only models what watermarking needs: declarations, stores and
//! loops with renamable name fields, the comprehension form a loop can be
//! rewritten into, and a labelled container for everything else. External
//! parsers hand trees over as JSON (serde), and every node keeps its
//! [`SourceSpan`] across rewrites.

mod render;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One-based line/column of a node in the original source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: u32,
    pub column: u32,
}

impl SourceSpan {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A parsed source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub body: Vec<Statement>,
}

impl SyntaxTree {
    pub fn new(body: Vec<Statement>) -> Self {
        Self { body }
    }

    /// Every identifier bound or referenced anywhere in the tree.
    pub fn names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for stmt in &self.body {
            stmt.collect_names(&mut names);
        }
        names
    }
}

/// Statement kinds. Only the first four carry watermark sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Declaration(Declaration),
    Store(Store),
    Loop(Loop),
    Comprehension(Comprehension),
    Other(Other),
}

impl Statement {
    pub fn span(&self) -> SourceSpan {
        match self {
            Self::Declaration(v) => v.span,
            Self::Store(v) => v.span,
            Self::Loop(v) => v.span,
            Self::Comprehension(v) => v.span,
            Self::Other(v) => v.span,
        }
    }

    fn collect_names(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Declaration(d) => {
                out.insert(d.name.clone());
                out.extend(d.params.iter().cloned());
                d.body.iter().for_each(|s| s.collect_names(out));
            }
            Self::Store(s) => {
                out.insert(s.target.clone());
                s.value.collect_names(out);
            }
            Self::Loop(l) => {
                out.insert(l.binding.clone());
                l.iterable.collect_names(out);
                l.body.iter().for_each(|s| s.collect_names(out));
            }
            Self::Comprehension(c) => {
                out.insert(c.binding.clone());
                c.iterable.collect_names(out);
                c.element.collect_names(out);
            }
            Self::Other(o) => {
                if let Some(value) = &o.value {
                    value.collect_names(out);
                }
                o.body.iter().for_each(|s| s.collect_names(out));
            }
        }
    }
}

/// Named function/procedure definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: SourceSpan,
}

/// Assignment that defines `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub target: String,
    pub value: Expr,
    #[serde(default)]
    pub span: SourceSpan,
}

/// `for binding in iterable: body`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loop {
    pub binding: String,
    pub iterable: Expr,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: SourceSpan,
}

impl Loop {
    /// The element expression if the body is exactly one expression statement.
    pub fn single_expression(&self) -> Option<&Expr> {
        match self.body.as_slice() {
            [Statement::Other(o)] if o.label == Other::EXPRESSION && o.body.is_empty() => {
                o.value.as_ref()
            }
            _ => None,
        }
    }
}

/// Statement-level comprehension `[element for binding in iterable]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comprehension {
    pub binding: String,
    pub iterable: Expr,
    pub element: Expr,
    #[serde(default)]
    pub span: SourceSpan,
}

/// Any other statement: expression statement, return, if/while block, ...
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Other {
    pub label: String,
    #[serde(default)]
    pub value: Option<Expr>,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: SourceSpan,
}

impl Other {
    /// Label of a bare expression statement.
    pub const EXPRESSION: &'static str = "expr";

    pub fn expression(value: Expr, span: SourceSpan) -> Self {
        Self {
            label: Self::EXPRESSION.to_string(),
            value: Some(value),
            body: Vec::new(),
            span,
        }
    }
}

/// Expressions. They are never watermark sites themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Name(String),
    Literal(String),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Attribute { value: Box<Expr>, attr: String },
    Binary { op: String, lhs: Box<Expr>, rhs: Box<Expr> },
    List(Vec<Expr>),
}

impl Expr {
    pub fn name(name: &str) -> Self {
        Self::Name(name.to_string())
    }

    pub fn literal(text: &str) -> Self {
        Self::Literal(text.to_string())
    }

    pub fn call(callee: &str, args: Vec<Expr>) -> Self {
        Self::Call { callee: Box::new(Self::name(callee)), args }
    }

    pub fn binary(op: &str, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary { op: op.to_string(), lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    /// Replace every `Name(from)` with `Name(to)`.
    pub fn rename(&mut self, from: &str, to: &str) {
        match self {
            Self::Name(n) if *n == from => *n = to.to_string(),
            Self::Name(_) | Self::Literal(_) => {}
            Self::Call { callee, args } => {
                callee.rename(from, to);
                args.iter_mut().for_each(|a| a.rename(from, to));
            }
            Self::Attribute { value, .. } => value.rename(from, to),
            Self::Binary { lhs, rhs, .. } => {
                lhs.rename(from, to);
                rhs.rename(from, to);
            }
            Self::List(items) => items.iter_mut().for_each(|e| e.rename(from, to)),
        }
    }

    fn collect_names(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Name(n) => {
                out.insert(n.clone());
            }
            Self::Literal(_) => {}
            Self::Call { callee, args } => {
                callee.collect_names(out);
                args.iter().for_each(|a| a.collect_names(out));
            }
            Self::Attribute { value, .. } => value.collect_names(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            Self::List(items) => items.iter().for_each(|e| e.collect_names(out)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SyntaxTree {
        SyntaxTree::new(vec![
            Statement::Store(Store {
                target: "total".into(),
                value: Expr::literal("0"),
                span: SourceSpan::new(1, 1),
            }),
            Statement::Loop(Loop {
                binding: "item".into(),
                iterable: Expr::name("items"),
                body: vec![Statement::Other(Other::expression(
                    Expr::call("print", vec![Expr::name("item")]),
                    SourceSpan::new(3, 5),
                ))],
                span: SourceSpan::new(2, 1),
            }),
        ])
    }

    #[test]
    fn names_cover_bindings_and_references() {
        let names = sample().names();
        for n in ["total", "item", "items", "print"] {
            assert!(names.contains(n), "missing {n}");
        }
    }

    #[test]
    fn single_expression_body_detected() {
        let tree = sample();
        let Statement::Loop(l) = &tree.body[1] else { panic!("expected loop") };
        assert_eq!(l.single_expression(), Some(&Expr::call("print", vec![Expr::name("item")])));
    }

    #[test]
    fn rename_substitutes_only_matching_names() {
        let mut e = Expr::binary("+", Expr::name("x"), Expr::call("f", vec![Expr::name("x"), Expr::name("y")]));
        e.rename("x", "_x");
        assert_eq!(
            e,
            Expr::binary("+", Expr::name("_x"), Expr::call("f", vec![Expr::name("_x"), Expr::name("y")]))
        );
    }

    #[test]
    fn json_roundtrip_keeps_spans() {
        let tree = sample();
        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains(r#""kind":"store""#));
        let back: SyntaxTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.body[1].span(), SourceSpan::new(2, 1));
    }
}
