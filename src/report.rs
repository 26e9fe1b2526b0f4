// Report views - turns normalized sales rows into the tables and scalars the
// presentation layers show.

use crate::aggregate::{gross_of, sort_desc_by, Aggregation, Group, Totals};
use crate::normalize::{date_span, month_labels};
use crate::parser::{AppleSale, GoogleSale, Source};
use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Human-readable note attached to a report (coverage, missing optional columns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// Revenue per currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRow {
    pub currency: String,
    pub gross: f64,
    pub net: f64,
    /// Sum of amounts in the buyer's own currency (Google Play only).
    pub local_amount: Option<f64>,
    /// Units sold (App Store only).
    pub quantity: Option<i64>,
    pub count: u64,
}

/// Revenue per product title (Google Play) or SKU (App Store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub product: String,
    /// First non-empty title seen for the SKU (App Store only).
    pub title: Option<String>,
    pub gross: f64,
    pub net: f64,
    pub quantity: Option<i64>,
    pub count: u64,
}

/// Revenue per country of sale (App Store only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRow {
    pub country: String,
    pub currency: String,
    pub gross: f64,
    pub net: f64,
    pub quantity: i64,
    pub count: u64,
}

/// Normalized input rows echoed back with the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "rows", rename_all = "snake_case")]
pub enum Records {
    GooglePlay(Vec<GoogleSale>),
    AppStore(Vec<AppleSale>),
}

impl Records {
    pub fn len(&self) -> usize {
        match self {
            Records::GooglePlay(rows) => rows.len(),
            Records::AppStore(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything computed from one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub source: Source,
    pub totals: Totals,
    pub currencies: Vec<CurrencyRow>,
    pub products: Option<Vec<ProductRow>>,
    pub countries: Option<Vec<CountryRow>>,
    pub records: Records,
    pub notices: Vec<Notice>,
}

impl Report {
    /// Reject reports whose sums overflowed. Cells are finite after cleaning, but
    /// summing them or applying the gross multiplier can still reach infinity.
    pub fn ensure_finite(&self) -> Result<()> {
        let mut amounts = vec![
            ("total gross", self.totals.gross),
            ("total net", self.totals.net),
        ];
        for row in &self.currencies {
            amounts.extend([("currency gross", row.gross), ("currency net", row.net)]);
            if let Some(local) = row.local_amount {
                amounts.push(("local amount", local));
            }
        }
        for row in self.products.iter().flatten() {
            amounts.extend([("product gross", row.gross), ("product net", row.net)]);
        }
        for row in self.countries.iter().flatten() {
            amounts.extend([("country gross", row.gross), ("country net", row.net)]);
        }

        match amounts.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((field, _)) => Err(ReportError::Overflow { field }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// GOOGLE PLAY
// ============================================================================

/// Build the Google Play report. `has_titles` is false when the export had no
/// `Product Title` column; the product view is then omitted with a warning.
pub fn google_report(sales: Vec<GoogleSale>, has_titles: bool) -> Report {
    let mut notices = Vec::new();

    let months = month_labels(sales.iter().map(|s| s.transaction_date));
    if !months.is_empty() {
        notices.push(Notice::info(format!("Data covers: {}", months.join(", "))));
    }

    let totals = Totals::of(&sales, |s| s.net_amount);

    let mut currencies: Vec<CurrencyRow> = Aggregation::new()
        .key(|s: &GoogleSale| s.buyer_currency.clone())
        .sum(|s| s.net_amount)
        .sum(|s| s.buyer_amount)
        .count()
        .apply(&sales)
        .groups
        .iter()
        .map(|g| CurrencyRow {
            currency: g.key(0).to_string(),
            gross: gross_of(g.sum(0)),
            net: g.sum(0),
            local_amount: Some(g.sum(1)),
            quantity: None,
            count: g.count(2),
        })
        .collect();
    sort_desc_by(&mut currencies, |r| r.local_amount.unwrap_or_default());

    let products = if has_titles {
        let mut rows: Vec<ProductRow> = Aggregation::new()
            .key(|s: &GoogleSale| s.product_title.clone().unwrap_or_default())
            .sum(|s| s.net_amount)
            .count()
            .apply(&sales)
            .groups
            .iter()
            .map(|g| ProductRow {
                product: g.key(0).to_string(),
                title: None,
                gross: gross_of(g.sum(0)),
                net: g.sum(0),
                quantity: None,
                count: g.count(1),
            })
            .collect();
        sort_desc_by(&mut rows, |r| r.gross);
        Some(rows)
    } else {
        notices.push(Notice::warning(format!(
            "CSV has no '{}' column; product breakdown skipped",
            crate::parser::GOOGLE_PRODUCT_TITLE
        )));
        None
    };

    info!(
        "Google Play report: {} rows, {} currencies, net {:.2}",
        sales.len(),
        currencies.len(),
        totals.net
    );

    Report {
        source: Source::GooglePlay,
        totals,
        currencies,
        products,
        countries: None,
        records: Records::GooglePlay(sales),
        notices,
    }
}

// ============================================================================
// APP STORE
// ============================================================================

fn quantity_row(g: &Group, net: usize, quantity: usize, count: usize) -> (f64, f64, i64, u64) {
    (gross_of(g.sum(net)), g.sum(net), g.quantity(quantity), g.count(count))
}

/// First non-empty title seen for each SKU. Titles are localized per storefront, so
/// one SKU can carry several.
fn sku_titles(sales: &[AppleSale]) -> HashMap<&str, &str> {
    let mut titles = HashMap::new();
    for sale in sales.iter().filter(|s| !s.title.is_empty()) {
        titles.entry(sale.sku.as_str()).or_insert(sale.title.as_str());
    }
    titles
}

/// Build the App Store settlement report.
pub fn apple_report(sales: Vec<AppleSale>) -> Report {
    let mut notices = Vec::new();

    let dates: Vec<_> = sales
        .iter()
        .map(|s| s.settlement_date.or(s.transaction_date))
        .collect();
    let months = month_labels(dates.iter().copied());
    if !months.is_empty() {
        notices.push(Notice::info(format!("Data covers: {}", months.join(", "))));
    }
    if let Some((first, last)) = date_span(dates.iter().copied()) {
        notices.push(Notice::info(format!(
            "Settlement period: {} ~ {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        )));
    }

    let totals = Totals::of(&sales, |s| s.partner_share);

    let mut currencies: Vec<CurrencyRow> = Aggregation::new()
        .key(|s: &AppleSale| s.currency.clone())
        .sum(|s| s.partner_share)
        .sum(|s| s.quantity)
        .count()
        .apply(&sales)
        .groups
        .iter()
        .map(|g| {
            let (gross, net, quantity, count) = quantity_row(g, 0, 1, 2);
            CurrencyRow {
                currency: g.key(0).to_string(),
                gross,
                net,
                local_amount: None,
                quantity: Some(quantity),
                count,
            }
        })
        .collect();
    sort_desc_by(&mut currencies, |r| r.net);

    let titles = sku_titles(&sales);
    let mut products: Vec<ProductRow> = Aggregation::new()
        .key(|s: &AppleSale| s.sku.clone())
        .sum(|s| s.partner_share)
        .sum(|s| s.quantity)
        .count()
        .apply(&sales)
        .groups
        .iter()
        .map(|g| {
            let (gross, net, quantity, count) = quantity_row(g, 0, 1, 2);
            ProductRow {
                product: g.key(0).to_string(),
                title: titles.get(g.key(0)).map(|t| t.to_string()),
                gross,
                net,
                quantity: Some(quantity),
                count,
            }
        })
        .collect();
    sort_desc_by(&mut products, |r| r.quantity.unwrap_or_default() as f64);

    let mut countries: Vec<CountryRow> = Aggregation::new()
        .key(|s: &AppleSale| s.country.clone())
        .key(|s: &AppleSale| s.currency.clone())
        .sum(|s| s.partner_share)
        .sum(|s| s.quantity)
        .count()
        .apply(&sales)
        .groups
        .iter()
        .map(|g| {
            let (gross, net, quantity, count) = quantity_row(g, 0, 1, 2);
            CountryRow {
                country: g.key(0).to_string(),
                currency: g.key(1).to_string(),
                gross,
                net,
                quantity,
                count,
            }
        })
        .collect();
    sort_desc_by(&mut countries, |r| r.net);

    info!(
        "App Store report: {} rows, {} SKUs, {} countries, net {:.2}",
        sales.len(),
        products.len(),
        countries.len(),
        totals.net
    );

    Report {
        source: Source::AppStore,
        totals,
        currencies,
        products: Some(products),
        countries: Some(countries),
        records: Records::AppStore(sales),
        notices,
    }
}
