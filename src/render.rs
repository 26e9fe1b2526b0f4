// Table and metric formatting shared by the text output and the TUI.

use crate::currency::currency_symbol;
use crate::parser::Source;
use crate::report::{NoticeLevel, Records, Report};
use format_num::format_num;

/// Unit suffix of merchant-currency amounts.
pub const MERCHANT_UNIT: &str = "원";
/// Unit suffix of transaction counts.
pub const COUNT_UNIT: &str = "건";

/// A titled grid of display strings.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTable {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

pub fn format_amount(value: f64) -> String {
    format_num!(",.0f", value)
}

pub fn format_merchant(value: f64) -> String {
    format!("{} {}", format_amount(value), MERCHANT_UNIT)
}

pub fn format_count(count: u64) -> String {
    format!("{} {}", format_amount(count as f64), COUNT_UNIT)
}

/// Amount in a buyer's currency, e.g. "$ 1,234".
pub fn format_local(currency: &str, value: f64) -> String {
    format!("{} {}", currency_symbol(currency), format_amount(value))
}

/// Net/gross figures: merchant currency for Google Play, settlement currency for
/// App Store rows that know theirs.
fn money(source: Source, currency: Option<&str>, value: f64) -> String {
    match (source, currency) {
        (Source::GooglePlay, _) => format_merchant(value),
        (Source::AppStore, Some(code)) => format_local(code, value),
        (Source::AppStore, None) => format_amount(value),
    }
}

fn opt_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

/// Gross/net metric pair.
pub fn metrics(report: &Report) -> [(&'static str, String); 2] {
    [
        ("Gross Sales", money(report.source, None, report.totals.gross)),
        ("Net Sales", money(report.source, None, report.totals.net)),
    ]
}

pub fn currency_table(report: &Report) -> TextTable {
    let source = report.source;
    let (headers, rows) = match source {
        Source::GooglePlay => (
            vec!["Gross", "Net", "Local Total", "Transactions", "Currency"],
            report
                .currencies
                .iter()
                .map(|r| {
                    vec![
                        money(source, None, r.gross),
                        money(source, None, r.net),
                        format_local(&r.currency, r.local_amount.unwrap_or_default()),
                        format_count(r.count),
                        r.currency.clone(),
                    ]
                })
                .collect(),
        ),
        Source::AppStore => (
            vec!["Currency", "Gross", "Net", "Quantity", "Transactions"],
            report
                .currencies
                .iter()
                .map(|r| {
                    vec![
                        r.currency.clone(),
                        money(source, Some(r.currency.as_str()), r.gross),
                        money(source, Some(r.currency.as_str()), r.net),
                        r.quantity.unwrap_or_default().to_string(),
                        format_count(r.count),
                    ]
                })
                .collect(),
        ),
    };
    TextTable {
        title: "Revenue by Currency".to_string(),
        headers,
        rows,
    }
}

pub fn product_table(report: &Report) -> Option<TextTable> {
    let products = report.products.as_ref()?;
    let source = report.source;
    let table = match source {
        Source::GooglePlay => TextTable {
            title: "Revenue by Product".to_string(),
            headers: vec!["Product", "Gross", "Net", "Sales"],
            rows: products
                .iter()
                .map(|p| {
                    vec![
                        p.product.clone(),
                        money(source, None, p.gross),
                        money(source, None, p.net),
                        format_count(p.count),
                    ]
                })
                .collect(),
        },
        Source::AppStore => TextTable {
            title: "Revenue by SKU".to_string(),
            headers: vec!["SKU", "Title", "Quantity", "Gross", "Net"],
            rows: products
                .iter()
                .map(|p| {
                    vec![
                        p.product.clone(),
                        p.title.clone().unwrap_or_default(),
                        p.quantity.unwrap_or_default().to_string(),
                        money(source, None, p.gross),
                        money(source, None, p.net),
                    ]
                })
                .collect(),
        },
    };
    Some(table)
}

pub fn country_table(report: &Report) -> Option<TextTable> {
    let countries = report.countries.as_ref()?;
    Some(TextTable {
        title: "Revenue by Country".to_string(),
        headers: vec!["Country", "Currency", "Quantity", "Gross", "Net"],
        rows: countries
            .iter()
            .map(|c| {
                vec![
                    c.country.clone(),
                    c.currency.clone(),
                    c.quantity.to_string(),
                    money(report.source, Some(c.currency.as_str()), c.gross),
                    money(report.source, Some(c.currency.as_str()), c.net),
                ]
            })
            .collect(),
    })
}

pub fn records_table(report: &Report) -> TextTable {
    let (headers, rows) = match &report.records {
        Records::GooglePlay(sales) => (
            vec!["Date", "Product", "Buyer Amount", "Currency", "Net"],
            sales
                .iter()
                .map(|s| {
                    vec![
                        opt_date(s.transaction_date),
                        s.product_title.clone().unwrap_or_default(),
                        format!("{:.2}", s.buyer_amount),
                        s.buyer_currency.clone(),
                        format!("{:.2}", s.net_amount),
                    ]
                })
                .collect(),
        ),
        Records::AppStore(sales) => (
            vec![
                "Settlement Date",
                "SKU",
                "Title",
                "Country",
                "Quantity",
                "Customer Price",
                "Partner Share",
                "Currency",
            ],
            sales
                .iter()
                .map(|s| {
                    vec![
                        opt_date(s.settlement_date),
                        s.sku.clone(),
                        s.title.clone(),
                        s.country.clone(),
                        format!("{}", s.quantity),
                        format!("{:.2}", s.customer_price),
                        format!("{:.2}", s.partner_share),
                        s.currency.clone(),
                    ]
                })
                .collect(),
        ),
    };
    TextTable {
        title: "Normalized Rows".to_string(),
        headers,
        rows,
    }
}

/// Every table of a report, in display order.
pub fn tables(report: &Report) -> Vec<TextTable> {
    let mut out = vec![currency_table(report)];
    out.extend(product_table(report));
    out.extend(country_table(report));
    out.push(records_table(report));
    out
}

fn width(s: &str) -> usize {
    s.chars().count()
}

impl TextTable {
    /// Column widths fitting the header and every cell.
    pub fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|c| width(c))
                    .chain(std::iter::once(width(h)))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Plain-text rendering, numbers right-aligned.
    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = format!("{}\n", self.title);

        let header: Vec<String> = self
            .headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{:>w$}", h, w = w))
            .collect();
        out.push_str(&header.join("  "));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("  "));
        out.push('\n');

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:>w$}", c, w = w))
                .collect();
            out.push_str(&cells.join("  "));
            out.push('\n');
        }
        out
    }
}

/// Full plain-text report: metrics, notices, then every table.
pub fn render_text(report: &Report) -> String {
    let mut out = format!("{} revenue report\n\n", report.source.name());

    for (label, value) in metrics(report) {
        out.push_str(&format!("{:<12} {}\n", label, value));
    }
    out.push('\n');

    for notice in &report.notices {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
        };
        out.push_str(&format!("[{}] {}\n", tag, notice.message));
    }
    if !report.notices.is_empty() {
        out.push('\n');
    }

    for table in tables(report) {
        out.push_str(&table.render());
        out.push('\n');
    }
    out
}
