// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Sequential, wrap-around reader over a watermark payload.

use super::error::{Result, WatermarkError};
use super::payload::WatermarkPayload;

/// Position into a payload. Owned by exactly one embedding run.
///
/// When the payload is exhausted the position wraps to 0 and the next site
/// reuses the payload from the start. Each wrap is logged.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    payload: &'a WatermarkPayload,
    position: usize,
    consumed: usize,
    wraps: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(payload: &'a WatermarkPayload) -> Result<Self> {
        if payload.is_empty() {
            return Err(WatermarkError::EmptyPayload);
        }
        Ok(Self { payload, position: 0, consumed: 0, wraps: 0 })
    }

    /// Consume one bit.
    pub fn next_bit(&mut self) -> u8 {
        if self.position == self.payload.len() {
            self.position = 0;
            self.wraps += 1;
            tracing::warn!(
                wrap = self.wraps,
                payload_len = self.payload.len(),
                "watermark payload exhausted, reusing from the start"
            );
        }
        let bit = self.payload.bits()[self.position];
        self.position += 1;
        self.consumed += 1;
        bit
    }

    /// Index of the next bit to be consumed, always in `[0, len)`.
    pub fn position(&self) -> usize {
        self.position % self.payload.len()
    }

    /// Total bits consumed, counting reuse.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn wraps(&self) -> usize {
        self.wraps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_rejected() {
        let payload = WatermarkPayload::from_bits(Vec::new());
        assert!(matches!(BitCursor::new(&payload), Err(WatermarkError::EmptyPayload)));
    }

    #[test]
    fn wraps_cyclically() {
        let payload: WatermarkPayload = "10110010".parse().unwrap();
        let mut cursor = BitCursor::new(&payload).unwrap();
        let drawn: Vec<u8> = (0..20).map(|_| cursor.next_bit()).collect();

        assert_eq!(cursor.wraps(), 2);
        assert_eq!(drawn[8], drawn[0]);
        assert_eq!(drawn[16], drawn[0]);
        assert_eq!(drawn, payload.cycled(20));
        assert_eq!(cursor.consumed(), 20);
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn no_wrap_until_exhausted() {
        let payload: WatermarkPayload = "01".parse().unwrap();
        let mut cursor = BitCursor::new(&payload).unwrap();
        cursor.next_bit();
        cursor.next_bit();
        assert_eq!(cursor.wraps(), 0);
        assert_eq!(cursor.position(), 0);
        cursor.next_bit();
        assert_eq!(cursor.wraps(), 1);
    }
}
