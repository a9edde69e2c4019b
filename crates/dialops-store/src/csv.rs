//! CSV codec for the contacts table.
//!
//! The import side follows the operator-facing contract: first row is the
//! header, quoted fields may contain commas and doubled quotes, values are
//! trimmed, and rows that are blank across every column are skipped. The
//! writer produces the same dialect.

use dialops_core::ContactRow;

/// Split one CSV line, honoring quotes and `""` escapes. Values come back
/// trimmed.
fn parse_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' {
            if in_quotes && chars.get(i + 1) == Some(&'"') {
                current.push('"');
                i += 1;
            } else {
                in_quotes = !in_quotes;
            }
        } else if c == ',' && !in_quotes {
            values.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
        i += 1;
    }
    values.push(current);

    values.into_iter().map(|v| v.trim().to_string()).collect()
}

/// Parse CSV content into contact rows keyed by the header columns.
/// Short rows are padded with empty strings; all-empty rows are dropped.
pub fn parse_csv(content: &str) -> Vec<ContactRow> {
    let lines: Vec<&str> = content
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some((header_line, data_lines)) = lines.split_first() else {
        return Vec::new();
    };
    let headers = parse_line(header_line);

    let mut rows = Vec::new();
    for line in data_lines {
        let values = parse_line(line);
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }

        let row = ContactRow::from_pairs(headers.iter().enumerate().map(|(i, header)| {
            (
                header.clone(),
                values.get(i).cloned().unwrap_or_default(),
            )
        }));
        rows.push(row);
    }

    rows
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render rows as CSV using the given column order.
pub fn write_csv(columns: &[String], rows: &[ContactRow]) -> String {
    let mut out = String::new();
    out.push_str(
        &columns
            .iter()
            .map(|c| escape_field(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');

    for row in rows {
        let line = columns
            .iter()
            .map(|column| escape_field(&row.value(column)))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }

    out
}

/// Union of column names across rows, in first-seen order. Used when the
/// backend hands rows back as JSON and a CSV has to be produced locally.
pub fn collect_columns(rows: &[ContactRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}
