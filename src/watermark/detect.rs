// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Detection engine.
//!
//! Walks an observed tree in the same order as the embedding engine and
//! reads one bit per recognisable site:
//!
//! - a declaration or store whose name is a whitelist entry (bit 0) or one
//!   of its transformed candidates (bit 1);
//! - with loop sites whitelisted, a single-expression loop (bit 0) or a
//!   statement-level comprehension (bit 1).
//!
//! The extracted bits are scored position by position against the expected
//! payload, repeated cyclically the way the embedding cursor reuses it. A
//! mismatch is reported through [`DetectionStatus`] and the ratio, never as
//! an error.
//!
//! Independently, once a full payload length has been read, the cyclic
//! copies are folded by majority vote and run back through the permutation,
//! cipher and error-correction layers to recover the identity bits.

use std::cmp::Ordering;

use serde::{Serialize, Serializer};

use super::payload::GeneratedPayload;
use super::whitelist::Whitelist;
use crate::codec::bits::{bits_to_bytes, to_bit_string};
use crate::codec::crypto::{self, CipherKey};
use crate::codec::{CodecError, ErrorCorrection};
use crate::syntax::{Statement, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    Detected,
    PartiallyDetected,
    NotDetected,
}

/// Outcome of decoding the extracted bits back to identity bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Recovery {
    /// Fewer bits extracted than one payload length.
    Incomplete { have: usize, need: usize },
    Recovered {
        #[serde(serialize_with = "bit_string")]
        bits: Vec<u8>,
        /// The recovered bits start with this project's identity bits.
        intact: bool,
        /// Recovered bits as UTF-8 text, when they decode as such.
        identity: Option<String>,
    },
    /// Decryption or error correction rejected the folded bits.
    Failed {
        #[serde(serialize_with = "display")]
        error: CodecError,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    #[serde(serialize_with = "bit_string")]
    pub extracted_bits: Vec<u8>,
    #[serde(serialize_with = "bit_string")]
    pub expected_bits_prefix: Vec<u8>,
    pub match_ratio: f64,
    pub status: DetectionStatus,
    pub recovery: Recovery,
}

fn bit_string<S: Serializer>(bits: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&to_bit_string(bits))
}

fn display<S: Serializer>(error: &CodecError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Read the bits an observed tree carries, in traversal order.
pub fn extract_bits(tree: &SyntaxTree, whitelist: &Whitelist) -> Vec<u8> {
    let mut walker = Extractor { whitelist, loops: whitelist.loops_enabled(), bits: Vec::new() };
    walker.visit_block(&tree.body);
    walker.bits
}

struct Extractor<'a> {
    whitelist: &'a Whitelist,
    loops: bool,
    bits: Vec<u8>,
}

impl Extractor<'_> {
    fn visit_block(&mut self, body: &[Statement]) {
        body.iter().for_each(|stmt| self.visit(stmt));
    }

    fn visit(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Declaration(d) => {
                self.name_site(&d.name, d.span.line);
                self.visit_block(&d.body);
            }
            Statement::Store(s) => self.name_site(&s.target, s.span.line),
            Statement::Loop(l) => {
                if self.loops && l.single_expression().is_some() {
                    self.push(0, l.span.line, "loop");
                }
                self.visit_block(&l.body);
            }
            Statement::Comprehension(c) => {
                if self.loops {
                    self.push(1, c.span.line, "comprehension");
                }
            }
            Statement::Other(o) => self.visit_block(&o.body),
        }
    }

    fn name_site(&mut self, name: &str, line: u32) {
        if let Some((original, bit)) = self.whitelist.lookup(name) {
            tracing::debug!(line, original, observed = name, bit, "name site recognised");
            self.bits.push(bit);
        }
    }

    fn push(&mut self, bit: u8, line: u32, site: &str) {
        tracing::debug!(line, site, bit, "structural site recognised");
        self.bits.push(bit);
    }
}

/// Per-position majority over cyclic copies. Ties go to the first copy.
fn fold(extracted: &[u8], period: usize) -> Vec<u8> {
    (0..period)
        .map(|i| {
            let copies: Vec<u8> = extracted.iter().skip(i).step_by(period).copied().collect();
            let ones = copies.iter().filter(|&&b| b == 1).count();
            match ones.cmp(&(copies.len() - ones)) {
                Ordering::Greater => 1,
                Ordering::Less => 0,
                Ordering::Equal => copies[0],
            }
        })
        .collect()
}

fn recover(
    extracted: &[u8],
    expected: &GeneratedPayload,
    codec: &ErrorCorrection,
    key: Option<&CipherKey>,
) -> Recovery {
    let need = expected.payload.len();
    if need == 0 || extracted.len() < need {
        return Recovery::Incomplete { have: extracted.len(), need };
    }

    let folded = expected.unpermute(&fold(extracted, need));
    let decrypted = match key {
        Some(key) => crypto::decrypt(&folded, key),
        None => Ok(folded),
    };
    match decrypted.and_then(|bits| codec.decode(&bits)) {
        Ok(bits) => {
            let intact = bits.starts_with(&expected.raw_bits);
            let whole = &bits[..bits.len() / 8 * 8];
            let identity = String::from_utf8(bits_to_bytes(whole))
                .ok()
                .map(|s| s.trim_end_matches('\0').to_string());
            Recovery::Recovered { bits, intact, identity }
        }
        Err(error) => {
            tracing::debug!(%error, "watermark recovery failed");
            Recovery::Failed { error }
        }
    }
}

/// Score `extracted` against `expected` and attempt recovery.
pub fn evaluate(
    extracted: Vec<u8>,
    expected: &GeneratedPayload,
    codec: &ErrorCorrection,
    key: Option<&CipherKey>,
) -> DetectionResult {
    let expected_bits_prefix = expected.payload.cycled(extracted.len());
    let matches = extracted.iter().zip(&expected_bits_prefix).filter(|(a, b)| a == b).count();

    let (match_ratio, status) = if expected_bits_prefix.is_empty() {
        (0.0, DetectionStatus::NotDetected)
    } else if extracted == expected_bits_prefix {
        (1.0, DetectionStatus::Detected)
    } else {
        (matches as f64 / expected_bits_prefix.len() as f64, DetectionStatus::PartiallyDetected)
    };

    let recovery = recover(&extracted, expected, codec, key);
    tracing::info!(
        extracted = extracted.len(),
        match_ratio,
        status = ?status,
        "watermark detection finished"
    );

    DetectionResult { extracted_bits: extracted, expected_bits_prefix, match_ratio, status, recovery }
}

/// Detect the watermark in one tree.
pub fn detect(
    tree: &SyntaxTree,
    whitelist: &Whitelist,
    expected: &GeneratedPayload,
    codec: &ErrorCorrection,
    key: Option<&CipherKey>,
) -> DetectionResult {
    evaluate(extract_bits(tree, whitelist), expected, codec, key)
}

/// Detect across many trees. Each call is independent.
#[cfg(feature = "parallel")]
pub fn detect_batch(
    trees: &[SyntaxTree],
    whitelist: &Whitelist,
    expected: &GeneratedPayload,
    codec: &ErrorCorrection,
    key: Option<&CipherKey>,
) -> Vec<DetectionResult> {
    use rayon::prelude::*;
    trees.par_iter().map(|tree| detect(tree, whitelist, expected, codec, key)).collect()
}

/// Detect across many trees. Each call is independent.
#[cfg(not(feature = "parallel"))]
pub fn detect_batch(
    trees: &[SyntaxTree],
    whitelist: &Whitelist,
    expected: &GeneratedPayload,
    codec: &ErrorCorrection,
    key: Option<&CipherKey>,
) -> Vec<DetectionResult> {
    trees.iter().map(|tree| detect(tree, whitelist, expected, codec, key)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Comprehension, Expr, Loop, Other, SourceSpan, Store};
    use crate::watermark::config::WatermarkConfig;
    use crate::watermark::payload;

    fn store(name: &str) -> Statement {
        Statement::Store(Store { target: name.into(), value: Expr::literal("0"), span: SourceSpan::default() })
    }

    fn expected() -> GeneratedPayload {
        payload::generate(&WatermarkConfig::new("Acme", 2024, "abcd-1234"), None).unwrap()
    }

    #[test]
    fn extracts_names_and_structures_in_order() {
        let tree = SyntaxTree::new(vec![
            store("Total"),
            Statement::Loop(Loop {
                binding: "x".into(),
                iterable: Expr::name("xs"),
                body: vec![Statement::Other(Other::expression(Expr::name("x"), SourceSpan::default()))],
                span: SourceSpan::default(),
            }),
            store("unrelated"),
            Statement::Comprehension(Comprehension {
                binding: "_x".into(),
                iterable: Expr::name("xs"),
                element: Expr::name("_x"),
                span: SourceSpan::default(),
            }),
            store("total"),
        ]);
        let wl = Whitelist::with_names(["total"], true);
        assert_eq!(extract_bits(&tree, &wl), vec![1, 0, 1, 0]);

        let names_only = Whitelist::with_names(["total"], false);
        assert_eq!(extract_bits(&tree, &names_only), vec![1, 0]);
    }

    #[test]
    fn majority_fold() {
        assert_eq!(fold(&[1, 0, 1, 0, 0, 0, 1, 1, 1], 3), vec![1, 0, 1]);
        // ties keep the first copy
        assert_eq!(fold(&[1, 1, 0, 0], 2), vec![1, 1]);
    }

    #[test]
    fn empty_extraction_not_detected() {
        let exp = expected();
        let result = evaluate(Vec::new(), &exp, &ErrorCorrection::Hamming74, None);
        assert_eq!(result.status, DetectionStatus::NotDetected);
        assert_eq!(result.match_ratio, 0.0);
        assert!(matches!(result.recovery, Recovery::Incomplete { have: 0, .. }));
    }

    #[test]
    fn exact_prefix_detected() {
        let exp = expected();
        let prefix = exp.payload.bits()[..5].to_vec();
        let result = evaluate(prefix, &exp, &ErrorCorrection::Hamming74, None);
        assert_eq!(result.status, DetectionStatus::Detected);
        assert_eq!(result.match_ratio, 1.0);
    }

    #[test]
    fn partial_match_ratio() {
        let exp = expected();
        let mut bits = exp.payload.bits()[..4].to_vec();
        bits[0] ^= 1;
        let result = evaluate(bits, &exp, &ErrorCorrection::Hamming74, None);
        assert_eq!(result.status, DetectionStatus::PartiallyDetected);
        assert!((result.match_ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn full_payload_recovers_identity() {
        let exp = expected();
        let mut bits = exp.payload.cycled(exp.payload.len() * 2 + 3);
        // position 0 has three copies, so one flip is outvoted
        bits[exp.payload.len()] ^= 1;
        let result = evaluate(bits, &exp, &ErrorCorrection::Hamming74, None);
        let Recovery::Recovered { intact, identity, .. } = result.recovery else {
            panic!("expected recovery, got {:?}", result.recovery)
        };
        assert!(intact);
        assert_eq!(identity.as_deref(), Some("Acme2024abcd-1234"));
    }

    #[test]
    fn serializes_as_bit_strings() {
        let exp = expected();
        let result = evaluate(vec![0, 1], &exp, &ErrorCorrection::Hamming74, None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["extracted_bits"], "01");
        assert_eq!(json["recovery"]["outcome"], "incomplete");
    }

    #[test]
    fn batch_matches_single() {
        let exp = expected();
        let wl = Whitelist::with_names(["total"], false);
        let trees = vec![SyntaxTree::new(vec![store("total")]), SyntaxTree::new(vec![store("Total")])];
        let results = detect_batch(&trees, &wl, &exp, &ErrorCorrection::Hamming74, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].extracted_bits, vec![0]);
        assert_eq!(results[1].extracted_bits, vec![1]);
    }
}
