// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Python-flavoured text rendering, for change review and debugging only.
//! Source printing proper belongs to the external printer.

use std::fmt::{self, Display, Formatter, Write};

use super::{Expr, Other, Statement, SyntaxTree};

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) | Self::Literal(n) => f.write_str(n),
            Self::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                f.write_char(')')
            }
            Self::Attribute { value, attr } => write!(f, "{value}.{attr}"),
            Self::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Self::List(items) => {
                f.write_char('[')?;
                write_list(f, items)?;
                f.write_char(']')
            }
        }
    }
}

fn write_list(f: &mut Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_block(f: &mut Formatter<'_>, body: &[Statement], depth: usize) -> fmt::Result {
    if body.is_empty() {
        return writeln!(f, "{:width$}pass", "", width = depth * 4);
    }
    body.iter().try_for_each(|stmt| write_stmt(f, stmt, depth))
}

fn write_stmt(f: &mut Formatter<'_>, stmt: &Statement, depth: usize) -> fmt::Result {
    let pad = depth * 4;
    match stmt {
        Statement::Declaration(d) => {
            writeln!(f, "{:pad$}def {}({}):", "", d.name, d.params.join(", "))?;
            write_block(f, &d.body, depth + 1)
        }
        Statement::Store(s) => writeln!(f, "{:pad$}{} = {}", "", s.target, s.value),
        Statement::Loop(l) => {
            writeln!(f, "{:pad$}for {} in {}:", "", l.binding, l.iterable)?;
            write_block(f, &l.body, depth + 1)
        }
        Statement::Comprehension(c) => {
            writeln!(f, "{:pad$}[{} for {} in {}]", "", c.element, c.binding, c.iterable)
        }
        Statement::Other(o) => {
            let head = match &o.value {
                Some(v) if o.label == Other::EXPRESSION => v.to_string(),
                Some(v) => format!("{} {v}", o.label),
                None => o.label.clone(),
            };
            if o.body.is_empty() {
                writeln!(f, "{:pad$}{head}", "")
            } else {
                writeln!(f, "{:pad$}{head}:", "")?;
                write_block(f, &o.body, depth + 1)
            }
        }
    }
}

impl Display for SyntaxTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.body.iter().try_for_each(|stmt| write_stmt(f, stmt, 0))
    }
}
