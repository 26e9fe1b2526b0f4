// Ingestion - bytes to text, and carving the transaction table out of
// multi-section settlement exports.

use crate::error::{ReportError, Result};
use encoding_rs::EUC_KR;
use tracing::{debug, warn};

const UTF8_BOM: &str = "\u{feff}";

// Header / footer markers of the settlement export. Case matters: the transaction
// header says "Country of Sale", the trailing summary says "Country Of Sale".
const HEADER_MARKER: &str = "SKU";
const HEADER_DATE_MARKERS: [&str; 2] = ["Transaction Date", "Settlement Date"];
const FOOTER_MARKERS: [&str; 2] = ["Country Of Sale", "Partner Share Currency"];

/// Half-open range of line indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode UTF-8, falling back to cp949 (Korean Windows exports).
///
/// The fallback never fails: malformed sequences become U+FFFD.
pub fn decode_with_fallback(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => strip_bom(text).to_string(),
        Err(e) => {
            debug!("Input is not UTF-8 ({}), decoding as cp949", e);
            let (text, had_errors) = EUC_KR.decode_without_bom_handling(data);
            if had_errors {
                warn!("Input is neither UTF-8 nor cp949, some characters were replaced");
            }
            text.into_owned()
        }
    }
}

/// Decode strict UTF-8.
pub fn decode_utf8(data: &[u8]) -> Result<String> {
    std::str::from_utf8(data)
        .map(|text| strip_bom(text).to_string())
        .map_err(|_| ReportError::Decode { encodings: "UTF-8" })
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix(UTF8_BOM).unwrap_or(text)
}

fn is_header_line(line: &str) -> bool {
    line.contains(HEADER_MARKER) && HEADER_DATE_MARKERS.iter().any(|m| line.contains(m))
}

fn is_footer_line(line: &str) -> bool {
    FOOTER_MARKERS.iter().all(|m| line.contains(m))
}

/// Locate the transaction table inside a settlement export.
///
/// `start` is the first line carrying the header markers (0 when there is none),
/// `end` is the first line after it that opens the country summary section, or the
/// number of lines when the file has no summary.
pub fn locate_table<S: AsRef<str>>(lines: &[S]) -> LineRange {
    let mut header: Option<usize> = None;
    let mut end = lines.len();

    for (idx, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if header.is_none() && is_header_line(line) {
            header = Some(idx);
            continue;
        }
        if is_footer_line(line) {
            end = idx;
            break;
        }
    }

    let start = match header {
        Some(idx) => idx,
        None => {
            debug!("No header row found, reading from the first line");
            0
        }
    };

    LineRange {
        start,
        end: end.max(start),
    }
}

/// Cut the transaction table out of `text`, ready for the CSV reader.
pub fn extract_table(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let range = locate_table(&lines);
    debug!(
        "Transaction table spans lines {}..{} of {}",
        range.start,
        range.end,
        lines.len()
    );
    let mut table = lines[range.start..range.end].join("\n");
    table.push('\n');
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_export() -> Vec<String> {
        let mut lines: Vec<String> = (0..50).map(|i| format!("preamble {}", i)).collect();
        lines[5] = "Transaction Date,Settlement Date,SKU,Title,Country of Sale,Quantity".to_string();
        lines[40] = "Country Of Sale,Partner Share Currency,Quantity,Extended Partner Share".to_string();
        lines
    }

    #[test]
    fn test_locate_table_header_and_footer() {
        let lines = synthetic_export();
        let range = locate_table(&lines);

        assert_eq!(range, LineRange { start: 5, end: 40 });
        assert_eq!(range.len(), 35);
    }

    #[test]
    fn test_locate_table_without_header_defaults_to_zero() {
        let lines = vec!["a,b,c", "1,2,3"];
        let range = locate_table(&lines);

        assert_eq!(range, LineRange { start: 0, end: 2 });
    }

    #[test]
    fn test_locate_table_settlement_date_only() {
        let lines = vec!["Report", "", "Settlement Date,SKU,Quantity", "01/02/2024,sku.a,1"];
        let range = locate_table(&lines);

        assert_eq!(range.start, 2);
        assert_eq!(range.end, 4);
    }

    #[test]
    fn test_locate_table_ignores_lowercase_country_of_sale() {
        // Real headers carry both footer words but with a lowercase "of".
        let lines = vec![
            "Transaction Date,SKU,Country of Sale,Partner Share Currency",
            "01/02/2024,sku.a,JP,JPY",
        ];
        assert_eq!(locate_table(&lines), LineRange { start: 0, end: 2 });
    }

    #[test]
    fn test_locate_table_empty_input() {
        let lines: Vec<&str> = Vec::new();
        let range = locate_table(&lines);
        assert!(range.is_empty());
    }

    #[test]
    fn test_extract_table_drops_preamble_and_summary() {
        let text = "Vendor,Acme\n\nTransaction Date,SKU,Quantity\n01/01/2024,a,1\n\nCountry Of Sale,Partner Share Currency\nJP,JPY\n";
        let table = extract_table(text);

        assert_eq!(table, "Transaction Date,SKU,Quantity\n01/01/2024,a,1\n\n");
    }

    #[test]
    fn test_decode_with_fallback_cp949() {
        // "포케팜" in cp949
        let bytes = [0xC6, 0xF7, 0xC4, 0xC9, 0xC6, 0xD2];
        assert_eq!(decode_with_fallback(&bytes), "포케팜");
    }

    #[test]
    fn test_decode_with_fallback_never_fails() {
        let text = decode_with_fallback(&[b'a', 0xFF, b'b']);
        assert!(text.starts_with('a'));
        assert!(text.ends_with('b'));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_decode_strips_bom() {
        let bytes = "\u{feff}a,b".as_bytes();
        assert_eq!(decode_with_fallback(bytes), "a,b");
        assert_eq!(decode_utf8(bytes).unwrap(), "a,b");
    }

    #[test]
    fn test_decode_utf8_rejects_invalid() {
        let result = decode_utf8(&[0xff, 0xfe, 0x00]);
        assert!(matches!(result, Err(ReportError::Decode { .. })));
    }
}
