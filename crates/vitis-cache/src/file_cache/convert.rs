//! Parsed rows to the canonical header/body/footer table.

use super::parser::ParsedFile;
use crate::model::{BodyItem, TableData};

/// A row whose first cell contains one of these (case-insensitive) is a
/// summary row and goes to the footer.
///
/// Lossy: a product literally named "Total ..." lands in the footer too.
pub const FOOTER_KEYWORDS: &[&str] = &[
    "total",
    "soma",
    "subtotal",
    "geral",
    "consolidado",
    "média",
    "media",
];

pub fn is_footer_row(row: &[String]) -> bool {
    row.first().is_some_and(|cell| {
        let cell = cell.trim().to_lowercase();
        FOOTER_KEYWORDS.iter().any(|kw| cell.contains(kw))
    })
}

pub fn to_table(parsed: &ParsedFile) -> TableData {
    // Columns with an empty name are dropped together with their cells.
    let kept: Vec<usize> = parsed
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.trim().is_empty())
        .map(|(i, _)| i)
        .collect();

    let mut table = TableData::default();
    if kept.is_empty() {
        return table;
    }
    table
        .header
        .push(kept.iter().map(|&i| parsed.columns[i].clone()).collect());

    for row in &parsed.rows {
        let cells: Vec<String> = kept
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or_default())
            .collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        if is_footer_row(&cells) {
            table.footer.push(cells);
        } else {
            table.body.push(BodyItem::new(cells));
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn footer_keywords_match_case_insensitively() {
        assert!(is_footer_row(&row(&["TOTAL GERAL", "10"])));
        assert!(is_footer_row(&row(&["  Subtotal ", "1"])));
        assert!(is_footer_row(&row(&["Média anual"])));
        assert!(is_footer_row(&row(&["MEDIA"])));
        assert!(!is_footer_row(&row(&["Vinho de mesa", "1"])));
        assert!(!is_footer_row(&[]));
    }

    #[test]
    fn product_named_total_is_misrouted_to_footer() {
        assert!(is_footer_row(&row(&["Total Vineyard Blend", "3"])));
    }

    #[test]
    fn splits_body_and_footer() {
        let parsed = ParsedFile {
            columns: row(&["produto", "2023"]),
            rows: vec![
                row(&["VINHO DE MESA", "100"]),
                row(&["SUCO", "20"]),
                row(&["Total", "120"]),
            ],
            ..Default::default()
        };
        let table = to_table(&parsed);
        assert_eq!(table.header, vec![row(&["produto", "2023"])]);
        assert_eq!(table.body.len(), 2);
        assert!(table.body.iter().all(|b| b.sub_items.is_empty()));
        assert_eq!(table.footer, vec![row(&["Total", "120"])]);
    }

    #[test]
    fn unnamed_columns_are_dropped() {
        let parsed = ParsedFile {
            columns: row(&["id", "", "produto"]),
            rows: vec![row(&["1", "x", "Uva"]), row(&["", "y", ""])],
            ..Default::default()
        };
        let table = to_table(&parsed);
        assert_eq!(table.header, vec![row(&["id", "produto"])]);
        assert_eq!(table.body, vec![BodyItem::new(row(&["1", "Uva"]))]);
    }

    #[test]
    fn empty_file_gives_empty_table() {
        let table = to_table(&ParsedFile::default());
        assert!(table.header.is_empty());
        assert!(table.has_no_rows());
    }
}
