// src/services/pricing.rs

//! Motor de preços: normaliza as linhas de uma opção e calcula os totais MRC/NRC.
//! Tudo aqui é puro e determinístico; a mesma sequência de linhas sempre gera os mesmos totais.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::contract::{LineItem, LineItemPayload, DEFAULT_TERM_MONTHS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionTotals {
    pub mrc: Decimal,
    pub nrc: Decimal,
}

/// Converte texto monetário ("$1,250.50") em decimal.
/// Remove tudo que não for dígito ou ponto; o que não puder ser lido vira zero.
pub fn parse_currency(raw: &str) -> Decimal {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();

    // Mantém só o primeiro ponto decimal: "1.2.3" -> "1.2"
    let mut number = String::with_capacity(cleaned.len());
    let mut seen_dot = false;
    for c in cleaned.chars() {
        if c == '.' {
            if seen_dot {
                break;
            }
            seen_dot = true;
        }
        number.push(c);
    }

    let number = number.trim_end_matches('.');
    if number.is_empty() {
        return Decimal::ZERO;
    }
    let number = if number.starts_with('.') {
        format!("0{}", number)
    } else {
        number.to_string()
    };

    Decimal::from_str(&number).unwrap_or(Decimal::ZERO)
}

/// Valor monetário vindo de JSON: número ou texto. Negativos e lixo viram zero.
pub fn parse_amount(raw: &Value) -> Decimal {
    match raw {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok()
            .filter(|d| !d.is_sign_negative())
            .unwrap_or(Decimal::ZERO),
        Value::String(s) => parse_currency(s),
        _ => Decimal::ZERO,
    }
}

/// Lê um inteiro no estilo "prefixo numérico" ("3 linhas" -> 3).
fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let value = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

fn parse_positive_int(raw: &Value) -> Option<u32> {
    let value = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_leading_int(s),
        _ => None,
    }?;
    (value >= 1).then(|| value.min(u32::MAX as i64) as u32)
}

/// Quantidade ausente, não numérica ou não positiva vale 1.
pub fn parse_quantity(raw: &Value) -> u32 {
    parse_positive_int(raw).unwrap_or(1)
}

/// Prazo em meses; ausente ou inválido usa o prazo padrão.
pub fn parse_term(raw: &Value) -> u32 {
    parse_positive_int(raw).unwrap_or(DEFAULT_TERM_MONTHS)
}

/// Normaliza as linhas cruas preservando a ordem. Tipos desconhecidos são descartados.
pub fn normalize_line_items(raw: &[LineItemPayload]) -> Vec<LineItem> {
    raw.iter()
        .filter_map(|item| match item {
            LineItemPayload::Header { value } => Some(LineItem::Header {
                value: value.trim().to_string(),
            }),
            LineItemPayload::Item { description, qty, mrc, nrc } => Some(LineItem::Item {
                description: description.trim().to_string(),
                qty: parse_quantity(qty),
                mrc: parse_amount(mrc),
                nrc: parse_amount(nrc),
            }),
            LineItemPayload::Unknown => None,
        })
        .collect()
}

/// Soma qty * preço só das linhas do tipo item. Cabeçalhos não interrompem a soma.
pub fn compute_totals(items: &[LineItem]) -> OptionTotals {
    let (mrc, nrc) = items.iter().fold((Decimal::ZERO, Decimal::ZERO), |(mrc, nrc), item| match item {
        LineItem::Item { qty, mrc: unit_mrc, nrc: unit_nrc, .. } => {
            let qty = Decimal::from(*qty);
            (mrc + qty * *unit_mrc, nrc + qty * *unit_nrc)
        }
        LineItem::Header { .. } => (mrc, nrc),
    });

    OptionTotals {
        mrc: mrc.round_dp(2),
        nrc: nrc.round_dp(2),
    }
}

pub fn has_priced_items(items: &[LineItem]) -> bool {
    items.iter().any(|i| matches!(i, LineItem::Item { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(qty: u32, mrc: i64, nrc: i64) -> LineItem {
        LineItem::Item {
            description: "linha".into(),
            qty,
            mrc: Decimal::from(mrc),
            nrc: Decimal::from(nrc),
        }
    }

    #[test]
    fn currency_parsing_strips_symbols_and_defaults_to_zero() {
        assert_eq!(parse_currency("$12.50"), Decimal::new(1250, 2));
        assert_eq!(parse_amount(&json!(12.5)), Decimal::new(125, 1));
        assert_eq!(parse_currency(""), Decimal::ZERO);
        assert_eq!(parse_currency("abc"), Decimal::ZERO);
        assert_eq!(parse_currency("$1,250.75/mo"), Decimal::new(125075, 2));
        assert_eq!(parse_currency("1.2.3"), Decimal::new(12, 1));
        assert_eq!(parse_currency(".5"), Decimal::new(5, 1));
        assert_eq!(parse_currency("12."), Decimal::from(12));
    }

    #[test]
    fn amounts_reject_negative_and_non_numeric_json() {
        assert_eq!(parse_amount(&json!(-4)), Decimal::ZERO);
        assert_eq!(parse_amount(&json!(null)), Decimal::ZERO);
        assert_eq!(parse_amount(&json!(true)), Decimal::ZERO);
        assert_eq!(parse_amount(&json!("$7")), Decimal::from(7));
    }

    #[test]
    fn quantity_defaults_to_one_when_invalid() {
        assert_eq!(parse_quantity(&json!(3)), 3);
        assert_eq!(parse_quantity(&json!("4 units")), 4);
        assert_eq!(parse_quantity(&json!(2.9)), 2);
        assert_eq!(parse_quantity(&json!(0)), 1);
        assert_eq!(parse_quantity(&json!(-2)), 1);
        assert_eq!(parse_quantity(&json!("abc")), 1);
        assert_eq!(parse_quantity(&json!(null)), 1);
    }

    #[test]
    fn term_defaults_to_thirty_six_months() {
        assert_eq!(parse_term(&json!(24)), 24);
        assert_eq!(parse_term(&json!("")), DEFAULT_TERM_MONTHS);
        assert_eq!(parse_term(&json!(0)), DEFAULT_TERM_MONTHS);
    }

    #[test]
    fn totals_follow_the_sum_formula() {
        let items = vec![item(2, 10, 5), item(1, 3, 0)];
        let totals = compute_totals(&items);
        assert_eq!(totals.mrc, Decimal::new(2300, 2));
        assert_eq!(totals.nrc, Decimal::new(1000, 2));
    }

    #[test]
    fn totals_are_deterministic() {
        let items = vec![
            LineItem::Header { value: "Voz".into() },
            item(3, 7, 1),
            LineItem::Header { value: "Dados".into() },
            item(1, 100, 250),
        ];
        assert_eq!(compute_totals(&items), compute_totals(&items));
        assert_eq!(compute_totals(&items).mrc, Decimal::from(121));
        assert_eq!(compute_totals(&items).nrc, Decimal::from(253));
    }

    #[test]
    fn header_only_option_totals_zero() {
        let items = vec![LineItem::Header { value: "Só cabeçalho".into() }];
        assert_eq!(compute_totals(&items), OptionTotals::default());
        assert!(!has_priced_items(&items));
    }

    #[test]
    fn normalization_keeps_order_and_defaults_fields() {
        let raw: Vec<LineItemPayload> = serde_json::from_value(json!([
            { "type": "item", "description": " Router ", "qty": "x", "mrc": "$5.00", "nrc": "" },
            { "type": "header", "value": "Extras" },
            { "type": "mystery" }
        ]))
        .unwrap();

        let items = normalize_line_items(&raw);
        assert_eq!(
            items,
            vec![
                LineItem::Item {
                    description: "Router".into(),
                    qty: 1,
                    mrc: Decimal::from(5),
                    nrc: Decimal::ZERO,
                },
                LineItem::Header { value: "Extras".into() },
            ]
        );
    }
}
