//! Monetary derivation for quote line items.
//!
//! CRM line items arrive as loosely-typed property bags with several aliases
//! per concept. This module normalizes one record into a [`LineAmounts`]
//! breakdown and folds a set of breakdowns into [`QuoteTotals`]. All
//! computation is pure and infallible: malformed numeric input degrades to
//! zero or a documented default instead of erroring.

pub mod description;
pub mod line_amounts;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use description::{parse_description_lines, BulletMarker, DescriptionLine};
pub use line_amounts::{compute_line_amounts, LineAmounts, LineItemRecord, DEFAULT_TAX_PCT};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTotals {
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub discount_total: Decimal,
    pub total: Decimal,
    pub effective_tax_pct: Decimal,
}

/// Pure reduction over per-line amounts. The effective tax percentage falls
/// back to `fallback_tax_pct` when the subtotal is zero.
pub fn quote_totals(lines: &[LineAmounts], fallback_tax_pct: Decimal) -> QuoteTotals {
    let subtotal: Decimal = lines.iter().map(|line| line.net_amount).sum();
    let vat: Decimal = lines.iter().map(|line| line.tax_amount).sum();
    let discount_total: Decimal = lines
        .iter()
        .filter(|line| line.has_explicit_discount)
        .map(|line| line.discount_eur)
        .sum();
    let total = (subtotal + vat).max(Decimal::ZERO);
    let effective_tax_pct = if subtotal > Decimal::ZERO {
        vat / subtotal * Decimal::ONE_HUNDRED
    } else {
        fallback_tax_pct
    };

    QuoteTotals { subtotal, vat, discount_total, total, effective_tax_pct }
}
