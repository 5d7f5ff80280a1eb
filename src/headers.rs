//! Header canonicalization.
//!
//! Spreadsheet exports spell the same column many ways ("R&D Spend (IDR)",
//! "rnd_cost", "\u{feff}\"Qtr\""). Every header is first reduced to a
//! lowercase underscore token and then looked up in a static alias table
//! that points at one of the nine [`CanonicalField`]s.

use crate::schema::CanonicalField;

/// Normalized header token to canonical field. Every canonical name maps to itself.
pub const ALIASES: &[(&str, CanonicalField)] = &[
    ("quarter", CanonicalField::Quarter),
    ("q", CanonicalField::Quarter),
    ("qtr", CanonicalField::Quarter),
    ("qtr_no", CanonicalField::Quarter),
    ("year", CanonicalField::Year),
    ("budget", CanonicalField::Budget),
    ("budget_idr", CanonicalField::Budget),
    ("total_budget", CanonicalField::Budget),
    ("marketing_spend", CanonicalField::MarketingSpend),
    ("marketing_cost", CanonicalField::MarketingSpend),
    ("marketing_expense", CanonicalField::MarketingSpend),
    ("marketing_outlay", CanonicalField::MarketingSpend),
    ("rnd_spend", CanonicalField::RndSpend),
    ("rndd_spend", CanonicalField::RndSpend),
    ("r_d_spend", CanonicalField::RndSpend),
    ("r_d_cost", CanonicalField::RndSpend),
    ("rnd_cost", CanonicalField::RndSpend),
    ("rnd_expense", CanonicalField::RndSpend),
    ("rndd_cost", CanonicalField::RndSpend),
    ("rndd_expense", CanonicalField::RndSpend),
    ("ops_spend", CanonicalField::OpsSpend),
    ("operations_spend", CanonicalField::OpsSpend),
    ("operations_cost", CanonicalField::OpsSpend),
    ("operations_expense", CanonicalField::OpsSpend),
    ("marketing_revenue", CanonicalField::MarketingRevenue),
    ("marketing_rev", CanonicalField::MarketingRevenue),
    ("marketing_income", CanonicalField::MarketingRevenue),
    ("marketing_sales", CanonicalField::MarketingRevenue),
    ("rnd_revenue", CanonicalField::RndRevenue),
    ("rndd_revenue", CanonicalField::RndRevenue),
    ("rndd_rev", CanonicalField::RndRevenue),
    ("r_d_revenue", CanonicalField::RndRevenue),
    ("rnd_rev", CanonicalField::RndRevenue),
    ("rnd_income", CanonicalField::RndRevenue),
    ("rnd_sales", CanonicalField::RndRevenue),
    ("rndd_income", CanonicalField::RndRevenue),
    ("rndd_sales", CanonicalField::RndRevenue),
    ("ops_revenue", CanonicalField::OpsRevenue),
    ("operations_revenue", CanonicalField::OpsRevenue),
    ("ops_rev", CanonicalField::OpsRevenue),
    ("ops_income", CanonicalField::OpsRevenue),
    ("ops_sales", CanonicalField::OpsRevenue),
];

pub fn lookup_alias(token: &str) -> Option<CanonicalField> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, field)| *field)
}

/// Reduces a raw header to a lowercase `[a-z0-9_]` token without mapping it.
pub fn normalize_header(raw: &str) -> String {
    let stripped = raw.strip_prefix('\u{feff}').unwrap_or(raw).trim();
    let stripped = stripped
        .strip_prefix(['"', '\''])
        .unwrap_or(stripped);
    let stripped = stripped
        .strip_suffix(['"', '\''])
        .unwrap_or(stripped)
        .trim();

    let lowered = remove_parenthesized(&stripped.to_lowercase()).replace('&', "nd");

    let mut token = String::with_capacity(lowered.len());
    let mut pending_separator = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !token.is_empty() {
                token.push('_');
            }
            pending_separator = false;
            token.push(c);
        } else {
            pending_separator = true;
        }
    }

    token
}

/// Drops every `(...)` group, matching each `(` with the nearest following `)`.
/// An unclosed `(` is kept and later collapses into a separator.
fn remove_parenthesized(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('(') {
        match rest[open..].find(')') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Maps a raw header to its canonical field name, or returns the normalized
/// token unchanged when no alias matches.
pub fn canonicalize_header(raw: &str) -> String {
    let token = normalize_header(raw);
    match lookup_alias(&token) {
        Some(field) => field.as_str().to_string(),
        None => token,
    }
}

pub fn canonical_field(raw: &str) -> Option<CanonicalField> {
    lookup_alias(&normalize_header(raw))
}
