//! Venue inference for bare futures codes such as `ru1901` or `SR901`.

use super::exchange::Exchange;
use super::instrument::futures_commodity;

/// Listed products per futures venue.
///
/// Case matters: DCE and SHFE list lower-case products, CZCE and CFFEX
/// upper-case ones.
const PRODUCTS: &[(Exchange, &[&str])] = &[
    (
        Exchange::SHFE,
        &[
            "cu", "al", "zn", "pb", "ni", "sn", "ss", "ao", "au", "ag", "rb", "wr", "hc", "fu",
            "bu", "ru", "sp", "br",
        ],
    ),
    (Exchange::INE, &["sc", "lu", "nr", "bc", "ec"]),
    (
        Exchange::DCE,
        &[
            "a", "b", "m", "y", "p", "c", "cs", "jd", "l", "v", "pp", "j", "jm", "i", "fb", "bb",
            "eg", "eb", "pg", "rr", "lh", "lg",
        ],
    ),
    (
        Exchange::CZCE,
        &[
            "SR", "CF", "CY", "TA", "MA", "FG", "RM", "OI", "ZC", "SA", "PF", "PK", "AP", "CJ",
            "UR", "SF", "SM", "SH", "PX", "WH", "PM", "RI", "LR", "JR", "RS",
        ],
    ),
    (
        Exchange::CFFEX,
        &["IF", "IH", "IC", "IM", "T", "TF", "TS", "TL"],
    ),
];

/// Infer the listing venue of a bare futures code.
///
/// The code must be a product prefix followed by a contract month. Exact
/// case matches win over case-insensitive ones so that `ru` stays on SHFE
/// while `RU` still resolves.
#[must_use]
pub fn infer_exchange(code: &str) -> Option<Exchange> {
    let commodity = futures_commodity(code);
    if commodity.is_empty() || commodity.len() == code.len() {
        return None;
    }
    if !code[commodity.len()..].chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    lookup(|product| product == commodity)
        .or_else(|| lookup(|product| product.eq_ignore_ascii_case(commodity)))
}

fn lookup(matches: impl Fn(&str) -> bool) -> Option<Exchange> {
    PRODUCTS
        .iter()
        .find(|(_, products)| products.iter().any(|p| matches(p)))
        .map(|(exchange, _)| *exchange)
}
