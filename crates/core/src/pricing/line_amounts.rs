use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default VAT percentage applied when the record carries no tax rate.
pub const DEFAULT_TAX_PCT: Decimal = Decimal::from_parts(21, 0, 0, false, 0);

// Alias lists per concept, in priority order. These encode the property names
// the CRM actually populates (HubSpot-prefixed first, plain second), not an
// arbitrary choice. First alias that parses as a number wins.
const QUANTITY_ALIASES: &[&str] = &["hs_quantity", "quantity"];
const UNIT_PRICE_ALIASES: &[&str] = &["hs_rate", "price"];
const AMOUNT_ALIASES: &[&str] = &["hs_amount", "amount"];
const DISCOUNT_AMOUNT_ALIASES: &[&str] =
    &["hs_discount_amount", "discount_amount", "hs_discount", "discount"];
const DISCOUNT_PERCENT_ALIASES: &[&str] = &["hs_discount_percentage", "discount_percentage"];
const TAX_RATE_ALIASES: &[&str] = &["hs_tax_rate", "tax_rate"];
const TAX_AMOUNT_ALIASES: &[&str] = &["hs_tax_amount", "tax_amount"];
const NAME_ALIASES: &[&str] = &["hs_name", "name"];
const DESCRIPTION_ALIASES: &[&str] = &["hs_description", "description"];

/// One raw CRM line-item property bag. No schema is enforced: every numeric
/// field is optional, independently aliased, and parsed defensively.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemRecord(pub serde_json::Map<String, Value>);

impl LineItemRecord {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.text(NAME_ALIASES)
    }

    pub fn description(&self) -> Option<&str> {
        self.text(DESCRIPTION_ALIASES)
    }

    fn text(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|key| self.0.get(*key).and_then(Value::as_str))
    }

    /// First alias whose value parses as a finite number. Fields that are
    /// absent or fail to parse are skipped rather than reported.
    fn number(&self, aliases: &[&str]) -> Option<Decimal> {
        aliases.iter().find_map(|key| self.0.get(*key).and_then(parse_num))
    }

    /// First alias that parses to a value strictly greater than zero. Used
    /// for "explicit" fields where zero and absent mean the same thing.
    fn positive(&self, aliases: &[&str]) -> Option<Decimal> {
        aliases
            .iter()
            .filter_map(|key| self.0.get(*key).and_then(parse_num))
            .find(|value| *value > Decimal::ZERO)
    }
}

fn parse_num(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => number.to_string().parse().ok(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// Normalized monetary breakdown of one line item. Computed on demand, never
/// persisted or mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub gross: Decimal,
    pub discount_eur: Decimal,
    pub discount_pct: Decimal,
    pub has_explicit_discount: bool,
    pub net_amount: Decimal,
    pub tax_rate_pct: Decimal,
    pub tax_amount: Decimal,
}

/// Derives a [`LineAmounts`] from one raw record.
///
/// Rules, in order:
/// - quantity defaults to 1, unit price to 0
/// - `gross = quantity * unit_price` only when both are positive; records
///   that carry only a total fall back to the explicit amount field
/// - a discount counts only when some discount field is present and positive;
///   absence of all discount fields means zero discount, not unknown
/// - `net_amount` is the explicit amount when positive, otherwise gross minus
///   discount, floored at zero
/// - a tax rate above 1 is taken as a percentage, at or below 1 as a fraction
///   (0.21 and 21 both normalize to 21)
pub fn compute_line_amounts(record: &LineItemRecord, fallback_tax_pct: Decimal) -> LineAmounts {
    let quantity = record.number(QUANTITY_ALIASES).unwrap_or(Decimal::ONE);
    let unit_price = record.number(UNIT_PRICE_ALIASES).unwrap_or(Decimal::ZERO);
    let explicit_amount = record.number(AMOUNT_ALIASES);

    let gross = if quantity > Decimal::ZERO && unit_price > Decimal::ZERO {
        quantity * unit_price
    } else {
        explicit_amount.unwrap_or(Decimal::ZERO)
    };

    let explicit_discount_eur = record.positive(DISCOUNT_AMOUNT_ALIASES);
    let explicit_discount_pct = record.positive(DISCOUNT_PERCENT_ALIASES);
    let has_explicit_discount =
        explicit_discount_eur.is_some() || explicit_discount_pct.is_some();

    let (discount_eur, discount_pct) = if has_explicit_discount {
        let eur = explicit_discount_eur.unwrap_or_else(|| {
            gross * explicit_discount_pct.unwrap_or(Decimal::ZERO) / Decimal::ONE_HUNDRED
        });
        let pct = explicit_discount_pct.unwrap_or_else(|| {
            if gross > Decimal::ZERO {
                eur / gross * Decimal::ONE_HUNDRED
            } else {
                Decimal::ZERO
            }
        });
        (eur, pct)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    let net_amount = match explicit_amount {
        Some(amount) if amount > Decimal::ZERO => amount,
        _ => (gross - discount_eur).max(Decimal::ZERO),
    };

    let raw_rate = record.number(TAX_RATE_ALIASES).unwrap_or(fallback_tax_pct);
    let tax_rate_pct =
        if raw_rate > Decimal::ONE { raw_rate } else { raw_rate * Decimal::ONE_HUNDRED };

    let tax_amount = record
        .positive(TAX_AMOUNT_ALIASES)
        .unwrap_or_else(|| net_amount * tax_rate_pct / Decimal::ONE_HUNDRED);

    LineAmounts {
        quantity,
        unit_price,
        gross,
        discount_eur,
        discount_pct,
        has_explicit_discount,
        net_amount,
        tax_rate_pct,
        tax_amount,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{compute_line_amounts, LineItemRecord, DEFAULT_TAX_PCT};

    fn amounts(value: serde_json::Value) -> super::LineAmounts {
        compute_line_amounts(&LineItemRecord::from_value(value), DEFAULT_TAX_PCT)
    }

    #[test]
    fn plain_quantity_times_price_with_default_vat() {
        let result = amounts(json!({ "hs_quantity": "3", "hs_rate": "100.00" }));

        assert_eq!(result.quantity, Decimal::new(3, 0));
        assert_eq!(result.unit_price, Decimal::new(100, 0));
        assert_eq!(result.net_amount, Decimal::new(300, 0));
        assert_eq!(result.tax_rate_pct, Decimal::new(21, 0));
        assert_eq!(result.tax_amount, Decimal::new(63, 0));
        assert!(!result.has_explicit_discount);
    }

    #[test]
    fn explicit_amount_overrides_quantity_times_price() {
        let result = amounts(json!({
            "hs_quantity": "2",
            "hs_rate": "100",
            "hs_amount": "150.50"
        }));

        assert_eq!(result.net_amount, Decimal::new(15050, 2));
    }

    #[test]
    fn amount_only_record_uses_amount_as_gross() {
        let result = amounts(json!({ "hs_amount": "2023.44" }));

        assert_eq!(result.gross, Decimal::new(202344, 2));
        assert_eq!(result.net_amount, Decimal::new(202344, 2));
    }

    #[test]
    fn alias_priority_prefers_hubspot_prefixed_fields() {
        let result = amounts(json!({ "hs_quantity": "2", "quantity": "9", "hs_rate": "10" }));

        assert_eq!(result.quantity, Decimal::new(2, 0));
        assert_eq!(result.net_amount, Decimal::new(20, 0));
    }

    #[test]
    fn zero_discount_fields_do_not_count_as_explicit() {
        let result = amounts(json!({
            "hs_quantity": "1",
            "hs_rate": "100",
            "hs_discount": "0",
            "hs_discount_percentage": "0"
        }));

        assert!(!result.has_explicit_discount);
        assert_eq!(result.discount_eur, Decimal::ZERO);
        assert_eq!(result.discount_pct, Decimal::ZERO);
        assert_eq!(result.net_amount, Decimal::new(100, 0));
    }

    #[test]
    fn discount_amount_derives_percentage_from_gross() {
        let result = amounts(json!({ "hs_quantity": "1", "hs_rate": "200", "hs_discount": "50" }));

        assert!(result.has_explicit_discount);
        assert_eq!(result.discount_eur, Decimal::new(50, 0));
        assert_eq!(result.discount_pct, Decimal::new(25, 0));
        assert_eq!(result.net_amount, Decimal::new(150, 0));
    }

    #[test]
    fn discount_percentage_derives_amount_from_gross() {
        let result = amounts(json!({
            "hs_quantity": "1",
            "hs_rate": "200",
            "hs_discount_percentage": "10"
        }));

        assert_eq!(result.discount_eur, Decimal::new(20, 0));
        assert_eq!(result.discount_pct, Decimal::new(10, 0));
        assert_eq!(result.net_amount, Decimal::new(180, 0));
    }

    #[test]
    fn net_amount_is_floored_at_zero() {
        let result = amounts(json!({ "hs_quantity": "1", "hs_rate": "50", "hs_discount": "80" }));

        assert_eq!(result.net_amount, Decimal::ZERO);
        assert_eq!(result.tax_amount, Decimal::ZERO);
    }

    #[test]
    fn fractional_and_percent_tax_rates_normalize_identically() {
        let fractional = amounts(json!({ "hs_quantity": "1", "hs_rate": "100", "hs_tax_rate": "0.21" }));
        let percent = amounts(json!({ "hs_quantity": "1", "hs_rate": "100", "hs_tax_rate": "21" }));

        assert_eq!(fractional.tax_rate_pct, Decimal::new(21, 0));
        assert_eq!(percent.tax_rate_pct, Decimal::new(21, 0));
        assert_eq!(fractional.tax_amount, percent.tax_amount);
    }

    #[test]
    fn explicit_tax_amount_overrides_computed_tax() {
        let result = amounts(json!({
            "hs_quantity": "1",
            "hs_rate": "100",
            "hs_tax_amount": "12.34"
        }));

        assert_eq!(result.tax_amount, Decimal::new(1234, 2));
    }

    #[test]
    fn malformed_numeric_fields_degrade_to_defaults_without_error() {
        let result = amounts(json!({
            "hs_quantity": "not-a-number",
            "hs_rate": { "nested": true },
            "hs_discount": "also bad"
        }));

        assert_eq!(result.quantity, Decimal::ONE);
        assert_eq!(result.unit_price, Decimal::ZERO);
        assert_eq!(result.net_amount, Decimal::ZERO);
        assert!(!result.has_explicit_discount);
    }

    #[test]
    fn numbers_may_arrive_as_json_numbers_or_strings() {
        let from_number = amounts(json!({ "hs_quantity": 2, "hs_rate": 10.5 }));
        let from_string = amounts(json!({ "hs_quantity": "2", "hs_rate": "10.5" }));

        assert_eq!(from_number.net_amount, from_string.net_amount);
    }
}
