//! Bank statement extraction.
//!
//! A statement PDF carries a transaction table: a header row naming the
//! columns, then one line per transaction with cells separated by a tab, a
//! `|` or a run of two or more spaces. Rows are reshaped into the columns
//! Firefly III imports: `Date, Description, Withdrawal, Deposit, Category,
//! Notes`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::converter::pdf_text::extract_lines;
use crate::converter::{read_input, write_output, ConvertOptions, Converter};
use crate::error::ConversionError;

static RE_CELL_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\|\s*|\t+|\s{2,}").unwrap());
static RE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\d.]+").unwrap());

const CSV_HEADER: &str = "Date,Description,Withdrawal,Deposit,Category,Notes";

/// One transaction in import order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    pub date: String,
    pub description: String,
    pub withdrawal: Option<f64>,
    pub deposit: Option<f64>,
    pub category: String,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Time,
    Description,
    Amount,
    Channel,
    Details,
}

fn column_for(header: &str) -> Option<Column> {
    let key: String = header
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    match key.as_str() {
        "date" | "transactiondate" => Some(Column::Date),
        "time/eff.date" | "time" | "eff.date" | "effectivedate" => Some(Column::Time),
        "descriptions" | "description" => Some(Column::Description),
        "withdrawal/deposit" | "amount" => Some(Column::Amount),
        "channel" => Some(Column::Channel),
        "details" => Some(Column::Details),
        _ => None,
    }
}

fn split_cells(line: &str) -> Vec<&str> {
    let line = line.trim().trim_matches('|').trim();
    if line.is_empty() {
        return Vec::new();
    }
    RE_CELL_SEPARATOR.split(line).map(str::trim).collect()
}

/// Header columns of a table line, or `None` when the line is not a header.
fn parse_header(cells: &[&str]) -> Option<Vec<Option<Column>>> {
    let columns: Vec<Option<Column>> = cells.iter().map(|cell| column_for(cell)).collect();
    let has = |wanted: Column| columns.iter().any(|c| *c == Some(wanted));
    (has(Column::Date) && has(Column::Amount)).then_some(columns)
}

/// Splits a withdrawal/deposit cell into its withdrawal and deposit parts.
///
/// `Dr`, `withdrawal` or a leading `-` mark a withdrawal; everything else
/// with a number in it is a deposit.
fn parse_amount(raw: &str) -> (Option<f64>, Option<f64>) {
    let value = raw.trim().replace(['$', '฿', ','], "");

    let Some(amount) = RE_AMOUNT
        .find(&value)
        .and_then(|m| m.as_str().parse::<f64>().ok())
    else {
        return (None, None);
    };

    let lower = value.to_lowercase();
    if lower.contains("dr") || lower.contains("withdrawal") || value.starts_with('-') {
        (Some(amount), None)
    } else {
        (None, Some(amount))
    }
}

fn cell<'a>(columns: &[Option<Column>], cells: &[&'a str], wanted: Column) -> &'a str {
    columns
        .iter()
        .position(|c| *c == Some(wanted))
        .and_then(|i| cells.get(i).copied())
        .unwrap_or("")
}

fn to_transaction(columns: &[Option<Column>], cells: &[&str]) -> Option<Transaction> {
    let get = |wanted: Column| cell(columns, cells, wanted);

    let (withdrawal, deposit) = parse_amount(get(Column::Amount));
    if withdrawal.is_none() && deposit.is_none() {
        return None;
    }

    let description = get(Column::Description);
    let details = get(Column::Details);
    let description = match (description.is_empty(), details.is_empty()) {
        (false, false) => format!("{} - {}", description, details),
        (false, true) => description.to_string(),
        _ => details.to_string(),
    };

    let time = get(Column::Time);
    let notes = if time.is_empty() {
        String::new()
    } else {
        format!("Time/Eff.Date: {}", time)
    };

    Some(Transaction {
        date: get(Column::Date).to_string(),
        description,
        withdrawal,
        deposit,
        category: get(Column::Channel).to_string(),
        notes,
    })
}

/// Transactions found in the text lines of a statement.
///
/// Lines before the first header are preamble. A repeated header (one per
/// page) resets the column layout.
fn parse_transactions<S: AsRef<str>>(
    lines: &[S],
) -> Result<Vec<Transaction>, ConversionError> {
    let mut columns: Option<Vec<Option<Column>>> = None;
    let mut transactions = Vec::new();

    for line in lines {
        let cells = split_cells(line.as_ref());
        if cells.len() < 2 {
            continue;
        }
        if let Some(header) = parse_header(&cells) {
            columns = Some(header);
            continue;
        }
        if let Some(ref columns) = columns {
            transactions.extend(to_transaction(columns, &cells));
        }
    }

    if columns.is_none() {
        return Err(ConversionError::Unsupported(
            "no transaction table found in statement".to_string(),
        ));
    }
    if transactions.is_empty() {
        return Err(ConversionError::Unsupported(
            "no data extracted from statement".to_string(),
        ));
    }

    Ok(transactions)
}

fn load_transactions(input: &Path) -> Result<Vec<Transaction>, ConversionError> {
    let pdf_bytes = read_input(input)?;
    let doc = lopdf::Document::load_mem(&pdf_bytes)
        .map_err(|e| ConversionError::Malformed(format!("not a readable PDF: {}", e)))?;

    let lines = extract_lines(&doc);
    tracing::debug!(lines = lines.len(), "Extracted statement text");

    let transactions = parse_transactions(&lines)?;
    tracing::debug!(transactions = transactions.len(), "Parsed statement");
    Ok(transactions)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_amount(amount: Option<f64>) -> String {
    amount.map(|a| format!("{:.2}", a)).unwrap_or_default()
}

fn to_csv(transactions: &[Transaction]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for t in transactions {
        let row = [
            csv_field(&t.date),
            csv_field(&t.description),
            csv_amount(t.withdrawal),
            csv_amount(t.deposit),
            csv_field(&t.category),
            csv_field(&t.notes),
        ];
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    csv
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatementDocument<'a> {
    rows: usize,
    data: &'a [Transaction],
    csv_content: String,
}

/// Converts a statement PDF into an importable CSV file.
pub struct StatementToCsv;

impl StatementToCsv {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StatementToCsv {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for StatementToCsv {
    fn name(&self) -> &str {
        "statement-to-csv"
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        let _span = tracing::info_span!("converter.statement_to_csv").entered();

        let transactions = load_transactions(input)?;
        write_output(output, to_csv(&transactions).as_bytes())
    }
}

/// Converts a statement PDF into a JSON document with the row count, the
/// transactions and the CSV rendering of them.
pub struct StatementToJson;

impl StatementToJson {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StatementToJson {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for StatementToJson {
    fn name(&self) -> &str {
        "statement-to-json"
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        let _span = tracing::info_span!("converter.statement_to_json").entered();

        let transactions = load_transactions(input)?;
        let document = StatementDocument {
            rows: transactions.len(),
            data: &transactions,
            csv_content: to_csv(&transactions),
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| ConversionError::Tool(e.to_string()))?;
        write_output(output, &json)
    }
}
