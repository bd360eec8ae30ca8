//! Candidate ranking for buys and sells.
//!
//! Ties on strength are broken by symbol so the same inputs always produce
//! the same order.

use crate::domain::Signal;
use std::cmp::Ordering;

fn by_symbol(a: &Signal, b: &Signal) -> Ordering {
    a.symbol.cmp(&b.symbol)
}

/// Bullish signals (`score > 0`), strongest `score × confidence` first.
pub fn buy_candidates<'s>(signals: &[&'s Signal]) -> Vec<&'s Signal> {
    let mut ranked: Vec<&Signal> = signals.iter().copied().filter(|s| s.score > 0.0).collect();
    ranked.sort_by(|a, b| {
        b.strength()
            .total_cmp(&a.strength())
            .then_with(|| by_symbol(a, b))
    });
    ranked
}

/// Signals for currently held symbols, most bearish first.
pub fn sell_candidates<'s>(
    signals: &[&'s Signal],
    is_held: impl Fn(&str) -> bool,
) -> Vec<&'s Signal> {
    let mut ranked: Vec<&Signal> = signals
        .iter()
        .copied()
        .filter(|s| is_held(&s.symbol))
        .collect();
    ranked.sort_by(|a, b| {
        a.strength()
            .total_cmp(&b.strength())
            .then_with(|| by_symbol(a, b))
    });
    ranked
}
