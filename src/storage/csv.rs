//! Minimal quote-aware CSV codec for the persisted artifacts.
//!
//! The cells carry Brazilian decimal commas, so quoting is not optional.
//! Quotes + CRLF tolerant on the way in, RFC-style escaping on the way out.

use std::mem::take;

use crate::domain::RawTable;

pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next(); // double-quote escape
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                row.push(take(&mut field));
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    // Flush a trailing field/row without a final newline.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

fn encode_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn encode_row(row: &[String]) -> String {
    row.iter().map(|c| encode_field(c)).collect::<Vec<_>>().join(",")
}

/// Serializes a table, header row first.
pub fn encode_table(table: &RawTable) -> String {
    let mut out = String::new();
    out.push_str(&encode_row(&table.headers));
    out.push('\n');
    for row in &table.rows {
        out.push_str(&encode_row(row));
        out.push('\n');
    }
    out
}

/// Parses serialized CSV back into a table; the first row is the header.
pub fn decode_table(text: &str) -> Option<RawTable> {
    let mut rows = parse_rows(text);
    if rows.is_empty() {
        return None;
    }
    let headers = rows.remove(0);
    Some(RawTable::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_decimal_commas() {
        let table = RawTable::new(
            vec!["Papel".into(), "Liq.2meses".into()],
            vec![vec!["PETR4".into(), "1.234.567,00".into()]],
        );
        let text = encode_table(&table);
        assert!(text.contains("\"1.234.567,00\""));
        let back = decode_table(&text).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn handles_embedded_quotes_and_crlf() {
        let text = "a,b\r\n\"x\"\"y\",\"1,5\"\r\n";
        let rows = parse_rows(text);
        assert_eq!(rows, vec![vec!["a", "b"], vec!["x\"y", "1,5"]]);
    }

    #[test]
    fn empty_input_decodes_to_none() {
        assert!(decode_table("").is_none());
    }
}
