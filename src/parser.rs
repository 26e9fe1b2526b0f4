// 🏗️ Parser Framework
// One parser per storefront export, selected by `Source`

use crate::currency::{currency_for_country, UNKNOWN_CURRENCY};
use crate::error::{ReportError, Result};
use crate::ingest::{decode_utf8, decode_with_fallback, extract_table};
use crate::normalize::{coerce_number, parse_date};
use crate::report::{apple_report, google_report, Report};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// Google Play sales export columns
pub const GOOGLE_TRANSACTION_DATE: &str = "Transaction Date";
pub const GOOGLE_NET_AMOUNT: &str = "Amount (Merchant Currency)";
pub const GOOGLE_BUYER_AMOUNT: &str = "Amount (Buyer Currency)";
pub const GOOGLE_BUYER_CURRENCY: &str = "Buyer Currency";
pub const GOOGLE_PRODUCT_TITLE: &str = "Product Title";

// App Store settlement export columns
pub const APPLE_TRANSACTION_DATE: &str = "Transaction Date";
pub const APPLE_SETTLEMENT_DATE: &str = "Settlement Date";
pub const APPLE_SKU: &str = "SKU";
pub const APPLE_TITLE: &str = "Title";
pub const APPLE_COUNTRY: &str = "Country of Sale";
pub const APPLE_QUANTITY: &str = "Quantity";
pub const APPLE_CUSTOMER_PRICE: &str = "Customer Price";
pub const APPLE_PARTNER_SHARE: &str = "Extended Partner Share";
pub const APPLE_CUSTOMER_CURRENCY: &str = "Customer Currency";

// ============================================================================
// CORE TYPES
// ============================================================================

/// Source - which storefront produced the export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    GooglePlay,
    AppStore,
}

impl Source {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            Source::GooglePlay => "Google Play",
            Source::AppStore => "App Store",
        }
    }

    /// Short code used on the command line and in URLs
    pub fn code(&self) -> &str {
        match self {
            Source::GooglePlay => "google",
            Source::AppStore => "apple",
        }
    }

    pub fn from_code(code: &str) -> Option<Source> {
        match code.trim().to_lowercase().as_str() {
            "google" | "google_play" | "play" => Some(Source::GooglePlay),
            "apple" | "app_store" | "appstore" => Some(Source::AppStore),
            _ => None,
        }
    }
}

/// One row of a Google Play sales export after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleSale {
    pub transaction_date: Option<NaiveDate>,
    /// Amount (Merchant Currency), the net proceeds
    pub net_amount: f64,
    /// Amount (Buyer Currency)
    pub buyer_amount: f64,
    pub buyer_currency: String,
    pub product_title: Option<String>,
}

/// One row of an App Store settlement export after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppleSale {
    pub transaction_date: Option<NaiveDate>,
    pub settlement_date: Option<NaiveDate>,
    pub sku: String,
    pub title: String,
    pub country: String,
    pub quantity: f64,
    pub customer_price: f64,
    /// Extended Partner Share, the net proceeds
    pub partner_share: f64,
    pub customer_currency: Option<String>,
    /// Resolved from the country of sale, never empty
    pub currency: String,
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// StoreParser - turns one uploaded export into a finished report
pub trait StoreParser: Send + Sync {
    /// Decode, normalize and aggregate `data`.
    ///
    /// # Returns
    /// * `Ok(Report)` - totals, breakdowns and notices
    /// * `Err(ReportError)` - undecodable input, missing columns or broken CSV
    fn analyze(&self, data: &[u8]) -> Result<Report>;

    /// Get the source this parser handles
    fn source(&self) -> Source;

    /// Get parser version
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect the source of an export from its file name, then from its content.
///
/// ```
/// use store_revenue::{detect_source, Source};
/// assert_eq!(detect_source("financial_report.csv", b"").unwrap(), Source::AppStore);
/// assert_eq!(detect_source("upload.csv", b"Buyer Currency,Amount").unwrap(), Source::GooglePlay);
/// ```
pub fn detect_source(file_name: &str, data: &[u8]) -> Result<Source> {
    let lower = file_name.to_lowercase();

    if lower.contains("apple") || lower.contains("financial_report") {
        return Ok(Source::AppStore);
    }

    if ["google", "play", "earnings", "sales"]
        .iter()
        .any(|p| lower.contains(p))
    {
        return Ok(Source::GooglePlay);
    }

    let text = String::from_utf8_lossy(data);
    if text.contains("Partner Share") {
        debug!("Detected App Store export from content");
        return Ok(Source::AppStore);
    }
    if text.contains(GOOGLE_BUYER_CURRENCY) {
        debug!("Detected Google Play export from content");
        return Ok(Source::GooglePlay);
    }

    Err(ReportError::UnknownSource(file_name.to_string()))
}

/// Get the parser for a source
pub fn get_parser(source: Source) -> Box<dyn StoreParser> {
    match source {
        Source::GooglePlay => Box::new(GooglePlayParser::new()),
        Source::AppStore => Box::new(AppStoreParser::new()),
    }
}

// ============================================================================
// COLUMN LOOKUP
// ============================================================================

/// Header positions of a CSV table, matched case-insensitively.
struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Columns {
            names: headers.iter().map(|h| h.trim().to_lowercase()).collect(),
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.names.iter().position(|h| *h == wanted)
    }

    /// Positions of all `names`, or every missing one at once.
    fn require(&self, names: &[&str]) -> Result<Vec<usize>> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.find(name) {
                Some(idx) => found.push(idx),
                None => missing.push(name.to_string()),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(ReportError::MissingColumns { columns: missing })
        }
    }
}

fn field(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
}

// ============================================================================
// GOOGLE PLAY
// ============================================================================

/// Google Play sales export parser
pub struct GooglePlayParser;

impl GooglePlayParser {
    pub fn new() -> Self {
        GooglePlayParser
    }

    /// Parse the export into rows. The flag tells whether `Product Title` was present.
    pub fn parse_records(&self, data: &[u8]) -> Result<(Vec<GoogleSale>, bool)> {
        let text = decode_with_fallback(data);
        let mut reader = csv_reader(&text);

        let columns = Columns::new(reader.headers()?);
        let required = columns.require(&[
            GOOGLE_NET_AMOUNT,
            GOOGLE_BUYER_AMOUNT,
            GOOGLE_BUYER_CURRENCY,
        ])?;
        let (net_idx, buyer_idx, currency_idx) = (required[0], required[1], required[2]);
        let date_idx = columns.find(GOOGLE_TRANSACTION_DATE);
        let title_idx = columns.find(GOOGLE_PRODUCT_TITLE);

        if date_idx.is_none() {
            warn!("Column '{}' not found, month coverage unavailable", GOOGLE_TRANSACTION_DATE);
        }
        if title_idx.is_none() {
            warn!("Column '{}' not found", GOOGLE_PRODUCT_TITLE);
        }

        let mut sales = Vec::new();
        for result in reader.records() {
            let record = result?;
            if is_blank(&record) {
                continue;
            }

            let currency = field(&record, Some(currency_idx));
            sales.push(GoogleSale {
                transaction_date: date_idx.and_then(|i| parse_date(field(&record, Some(i)))),
                net_amount: coerce_number(field(&record, Some(net_idx))),
                buyer_amount: coerce_number(field(&record, Some(buyer_idx))),
                buyer_currency: if currency.is_empty() {
                    UNKNOWN_CURRENCY.to_string()
                } else {
                    currency.to_string()
                },
                product_title: title_idx.map(|i| field(&record, Some(i)).to_string()),
            });
        }

        debug!("Parsed {} Google Play rows", sales.len());
        Ok((sales, title_idx.is_some()))
    }
}

impl Default for GooglePlayParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreParser for GooglePlayParser {
    fn analyze(&self, data: &[u8]) -> Result<Report> {
        let (sales, has_titles) = self.parse_records(data)?;
        let report = google_report(sales, has_titles);
        report.ensure_finite()?;
        Ok(report)
    }

    fn source(&self) -> Source {
        Source::GooglePlay
    }
}

// ============================================================================
// APP STORE
// ============================================================================

/// App Store settlement export parser
pub struct AppStoreParser;

impl AppStoreParser {
    pub fn new() -> Self {
        AppStoreParser
    }

    /// Parse the transaction section of a settlement export into rows.
    pub fn parse_records(&self, data: &[u8]) -> Result<Vec<AppleSale>> {
        let text = decode_utf8(data)?;
        let table = extract_table(&text);
        let mut reader = csv_reader(&table);

        let columns = Columns::new(reader.headers()?);
        let required = columns.require(&[
            APPLE_PARTNER_SHARE,
            APPLE_QUANTITY,
            APPLE_COUNTRY,
            APPLE_SKU,
        ])?;
        let (share_idx, qty_idx, country_idx, sku_idx) =
            (required[0], required[1], required[2], required[3]);
        let settlement_idx = columns.find(APPLE_SETTLEMENT_DATE);
        let transaction_idx = columns.find(APPLE_TRANSACTION_DATE);
        let title_idx = columns.find(APPLE_TITLE);
        let price_idx = columns.find(APPLE_CUSTOMER_PRICE);
        let customer_currency_idx = columns.find(APPLE_CUSTOMER_CURRENCY);

        let mut sales = Vec::new();
        for result in reader.records() {
            let record = result?;
            if is_blank(&record) {
                continue;
            }

            let country = field(&record, Some(country_idx));
            let customer_currency = customer_currency_idx
                .map(|i| field(&record, Some(i)))
                .filter(|c| !c.is_empty());

            sales.push(AppleSale {
                transaction_date: parse_date(field(&record, transaction_idx)),
                settlement_date: parse_date(field(&record, settlement_idx)),
                sku: field(&record, Some(sku_idx)).to_string(),
                title: field(&record, title_idx).to_string(),
                country: country.to_string(),
                quantity: coerce_number(field(&record, Some(qty_idx))),
                customer_price: coerce_number(field(&record, price_idx)),
                partner_share: coerce_number(field(&record, Some(share_idx))),
                customer_currency: customer_currency.map(str::to_string),
                currency: currency_for_country(country, customer_currency),
            });
        }

        debug!("Parsed {} App Store rows", sales.len());
        Ok(sales)
    }
}

impl Default for AppStoreParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreParser for AppStoreParser {
    fn analyze(&self, data: &[u8]) -> Result<Report> {
        let sales = self.parse_records(data)?;
        let report = apple_report(sales);
        report.ensure_finite()?;
        Ok(report)
    }

    fn source(&self) -> Source {
        Source::AppStore
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const GOOGLE_CSV: &str = "\
Description,Transaction Date,Transaction Time,Product Title,Amount (Buyer Currency),Buyer Currency,Amount (Merchant Currency)
GPA.1,\"Mar 1, 2024\",1:00:00 AM PST,Gem Pack,0.99,USD,\"1,000\"
GPA.2,\"Mar 2, 2024\",2:00:00 AM PST,Gem Pack,1.98,USD,\"2,000\"
GPA.3,\"Apr 3, 2024\",3:00:00 AM PST,Starter Bundle,\"1,200\",KRW,\"1,100\"
GPA.4,garbage,4:00:00 AM PST,Starter Bundle,n/a,JPY,oops
";

    const APPLE_CSV: &str = "\
iTunes Connect - Payments and Financial Reports
Vendor #,12345

Transaction Date,Settlement Date,Apple Identifier,SKU,Title,Country of Sale,Quantity,Partner Share,Extended Partner Share,Partner Share Currency,Customer Price,Customer Currency
01/03/2024,01/20/2024,111,gems_small,Small Gems,JP,2,84,168,JPY,120,JPY
01/04/2024,01/20/2024,111,gems_small,Small Gems,US,1,0.7,0.7,USD,0.99,USD
01/05/2024,01/21/2024,222,gems_big,Big Gems,FR,3,\"1,000\",\"3,000\",EUR,\"1,299\",EUR
01/06/2024,01/21/2024,222,gems_big,Big Gems,BR,1,5,5,BRL,7,

Country Of Sale,Partner Share Currency,Quantity,Extended Partner Share
JP,JPY,2,168
US,USD,1,0.7
";

    #[test]
    fn test_source_names_and_codes() {
        assert_eq!(Source::GooglePlay.name(), "Google Play");
        assert_eq!(Source::AppStore.name(), "App Store");
        assert_eq!(Source::GooglePlay.code(), "google");
        assert_eq!(Source::AppStore.code(), "apple");
        assert_eq!(Source::from_code("Apple"), Some(Source::AppStore));
        assert_eq!(Source::from_code("play"), Some(Source::GooglePlay));
        assert_eq!(Source::from_code("amazon"), None);
    }

    #[test]
    fn test_detect_source_by_name() {
        assert_eq!(detect_source("apple_jan.csv", b"").unwrap(), Source::AppStore);
        assert_eq!(detect_source("financial_report_2024.csv", b"").unwrap(), Source::AppStore);
        assert_eq!(detect_source("PlayApps_202403.csv", b"").unwrap(), Source::GooglePlay);
        assert_eq!(detect_source("earnings_202403.csv", b"").unwrap(), Source::GooglePlay);
    }

    #[test]
    fn test_detect_source_by_content() {
        assert_eq!(
            detect_source("upload.csv", APPLE_CSV.as_bytes()).unwrap(),
            Source::AppStore
        );
        assert_eq!(
            detect_source("upload.csv", GOOGLE_CSV.as_bytes()).unwrap(),
            Source::GooglePlay
        );
    }

    #[test]
    fn test_detect_source_unknown() {
        let result = detect_source("report.csv", b"a,b,c\n1,2,3\n");
        assert!(matches!(result, Err(ReportError::UnknownSource(_))));
    }

    #[test]
    fn test_get_parser() {
        assert_eq!(get_parser(Source::GooglePlay).source(), Source::GooglePlay);
        assert_eq!(get_parser(Source::AppStore).source(), Source::AppStore);
        assert_eq!(get_parser(Source::AppStore).version(), "1.0.0");
    }

    #[test]
    fn test_google_parse_records() {
        let (sales, has_titles) = GooglePlayParser::new()
            .parse_records(GOOGLE_CSV.as_bytes())
            .unwrap();

        assert!(has_titles);
        assert_eq!(sales.len(), 4);
        assert_eq!(sales[0].net_amount, 1000.0);
        assert_eq!(sales[0].buyer_amount, 0.99);
        assert_eq!(sales[0].buyer_currency, "USD");
        assert_eq!(sales[0].product_title.as_deref(), Some("Gem Pack"));
        assert_eq!(sales[0].transaction_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(sales[2].buyer_amount, 1200.0);

        // Unparseable cells are cleaned, not rejected
        assert_eq!(sales[3].transaction_date, None);
        assert_eq!(sales[3].net_amount, 0.0);
        assert_eq!(sales[3].buyer_amount, 0.0);
    }

    #[test]
    fn test_google_analyze() {
        let report = GooglePlayParser::new().analyze(GOOGLE_CSV.as_bytes()).unwrap();

        assert_eq!(report.source, Source::GooglePlay);
        assert_eq!(report.totals.net, 4100.0);
        assert_eq!(report.currencies.len(), 3);
        assert_eq!(report.currencies[0].currency, "KRW");
        assert_eq!(report.notices[0].message, "Data covers: 03월, 04월");
    }

    #[test]
    fn test_google_missing_required_columns() {
        let csv = "Transaction Date,Amount (Merchant Currency)\n2024-03-01,100\n";
        let result = GooglePlayParser::new().analyze(csv.as_bytes());

        match result {
            Err(ReportError::MissingColumns { columns }) => {
                assert_eq!(columns, vec!["Amount (Buyer Currency)", "Buyer Currency"]);
            }
            other => panic!("expected missing columns, got {:?}", other),
        }
    }

    #[test]
    fn test_google_without_product_title() {
        let csv = "Amount (Merchant Currency),Amount (Buyer Currency),Buyer Currency\n100,1,USD\n";
        let (sales, has_titles) = GooglePlayParser::new().parse_records(csv.as_bytes()).unwrap();

        assert!(!has_titles);
        assert_eq!(sales[0].product_title, None);
        assert_eq!(sales[0].transaction_date, None);
    }

    #[test]
    fn test_google_cp949_fallback() {
        let mut bytes = b"Product Title,Amount (Merchant Currency),Amount (Buyer Currency),Buyer Currency\n".to_vec();
        // "포케팜" in cp949
        bytes.extend_from_slice(&[0xC6, 0xF7, 0xC4, 0xC9, 0xC6, 0xD2]);
        bytes.extend_from_slice(b",1000,1000,KRW\n");

        let (sales, _) = GooglePlayParser::new().parse_records(&bytes).unwrap();
        assert_eq!(sales[0].product_title.as_deref(), Some("포케팜"));
        assert_eq!(sales[0].net_amount, 1000.0);
    }

    #[test]
    fn test_google_overflowing_amounts_rejected() {
        let csv = "Amount (Merchant Currency),Amount (Buyer Currency),Buyer Currency\n1.5e308,1,KRW\n";
        let result = GooglePlayParser::new().analyze(csv.as_bytes());

        match result {
            Err(err @ ReportError::Overflow { .. }) => assert!(err.is_user_error()),
            other => panic!("expected overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_google_empty_currency_is_unknown() {
        let csv = "Amount (Merchant Currency),Amount (Buyer Currency),Buyer Currency\n100,1,\n";
        let (sales, _) = GooglePlayParser::new().parse_records(csv.as_bytes()).unwrap();
        assert_eq!(sales[0].buyer_currency, "Unknown");
    }

    #[test]
    fn test_apple_parse_records() {
        let sales = AppStoreParser::new()
            .parse_records(APPLE_CSV.as_bytes())
            .unwrap();

        // Preamble and country summary are excluded
        assert_eq!(sales.len(), 4);
        assert_eq!(sales[0].sku, "gems_small");
        assert_eq!(sales[0].currency, "JPY");
        assert_eq!(sales[0].partner_share, 168.0);
        assert_eq!(sales[0].settlement_date, NaiveDate::from_ymd_opt(2024, 1, 20));
        assert_eq!(sales[2].partner_share, 3000.0);
        assert_eq!(sales[2].customer_price, 1299.0);
        assert_eq!(sales[2].currency, "EUR");
        assert_eq!(sales[3].currency, "Unknown");
        assert_eq!(sales[3].customer_currency, None);
    }

    #[test]
    fn test_apple_analyze() {
        let report = AppStoreParser::new().analyze(APPLE_CSV.as_bytes()).unwrap();

        assert_eq!(report.source, Source::AppStore);
        assert!((report.totals.net - 3173.7).abs() < 1e-9);
        let products = report.products.unwrap();
        assert_eq!(products[0].product, "gems_big");
        assert_eq!(products[0].quantity, Some(4));
        assert_eq!(report.countries.unwrap().len(), 4);
    }

    #[test]
    fn test_apple_sku_with_localized_titles_is_one_row() {
        let csv = "\
Transaction Date,Settlement Date,SKU,Title,Country of Sale,Quantity,Extended Partner Share
01/03/2024,01/20/2024,gems,Gems,US,1,0.7
01/04/2024,01/20/2024,gems,ジェム,JP,2,168
";
        let report = AppStoreParser::new().analyze(csv.as_bytes()).unwrap();
        let products = report.products.unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product, "gems");
        assert_eq!(products[0].title.as_deref(), Some("Gems"));
        assert_eq!(products[0].quantity, Some(3));
        assert_eq!(products[0].count, 2);
    }

    #[test]
    fn test_apple_without_header_is_recoverable() {
        let csv = "just,some,columns\n1,2,3\n";
        let result = AppStoreParser::new().analyze(csv.as_bytes());
        assert!(matches!(result, Err(ReportError::MissingColumns { .. })));
    }

    #[test]
    fn test_apple_rejects_non_utf8() {
        let result = AppStoreParser::new().analyze(&[0xff, 0xfe, b'a']);
        assert!(matches!(result, Err(ReportError::Decode { .. })));
    }
}
