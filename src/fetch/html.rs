//! Extraction of the scraped table markup into a [`RawTable`].

use scraper::{Html, Selector};

use crate::domain::RawTable;
use crate::error::{Result, ScraperError};

/// Parses the outer HTML of the result table. The first row (header cells)
/// becomes the header list, verbatim; every following row keeps its cells as
/// unmodified strings.
pub fn parse_table(html: &str) -> Result<RawTable> {
    let row_selector = selector("tr")?;
    let cell_selector = selector("th, td")?;

    let fragment = Html::parse_fragment(html);
    let mut rows: Vec<Vec<String>> = Vec::new();

    for tr in fragment.select(&row_selector) {
        let cells: Vec<String> = tr
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();
        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    if rows.len() < 2 {
        return Err(ScraperError::Parse {
            message: format!("expected a header row and data rows, got {} rows", rows.len()),
        });
    }

    let headers = rows.remove(0);
    Ok(RawTable::new(headers, rows))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScraperError::Parse {
        message: format!("bad selector '{}': {:?}", css, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <table id="resultado">
          <thead>
            <tr><th>Papel</th><th>Cotação</th><th>Liq.2meses</th><th>Mrg Ebit</th><th>EV/EBIT</th><th>P/L</th></tr>
          </thead>
          <tbody>
            <tr><td>PETR4</td><td>38,50</td><td>1.234.567,00</td><td>25,30%</td><td>3,50</td><td>4,20</td></tr>
            <tr><td>VALE3</td><td>61,20</td><td>2.000.000,00</td><td>30,00%</td><td>4,00</td><td>5,10</td></tr>
          </tbody>
        </table>"#;

    #[test]
    fn parses_headers_and_rows_verbatim() {
        let table = parse_table(SAMPLE).unwrap();
        assert_eq!(table.headers[0], "Papel");
        assert_eq!(table.headers.len(), 6);
        assert_eq!(table.len(), 2);
        // Locale formatting untouched
        assert_eq!(table.cell(0, "Liq.2meses"), Some("1.234.567,00"));
        assert_eq!(table.cell(1, "Papel"), Some("VALE3"));
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        assert!(parse_table("<div>nothing here</div>").is_err());
        assert!(parse_table("<table><tr><th>Papel</th></tr></table>").is_err());
    }
}
