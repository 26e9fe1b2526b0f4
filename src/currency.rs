/// Currency used when neither the country table nor the row itself names one.
pub const UNKNOWN_CURRENCY: &str = "Unknown";

/// Currency settled for a country of sale.
pub fn country_currency(country: &str) -> Option<&'static str> {
    match country.trim() {
        "JP" => Some("JPY"),
        "KR" => Some("KRW"),
        "CA" => Some("CAD"),
        "US" => Some("USD"),
        _ => None,
    }
}

/// Resolve the currency of a settlement row: country table first, then the row's
/// customer currency, then [`UNKNOWN_CURRENCY`].
pub fn currency_for_country(country: &str, customer_currency: Option<&str>) -> String {
    if let Some(code) = country_currency(country) {
        return code.to_string();
    }
    match customer_currency.map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => UNKNOWN_CURRENCY.to_string(),
    }
}

/// Display prefix for a currency code. Unknown codes fall back to "CODE ".
pub fn currency_symbol(code: &str) -> String {
    let symbol = match code {
        "USD" => "$",
        "KRW" => "₩",
        "JPY" => "￥",
        "EUR" => "€",
        "GBP" => "£",
        "CNY" => "¥",
        "TWD" => "NT$",
        "HKD" => "HK$",
        _ => return format!("{} ", code),
    };
    symbol.to_string()
}
