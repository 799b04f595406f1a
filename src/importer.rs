use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::ledger::{self, TransactionInput};
use crate::models::{PaymentMethod, Transaction, TransactionType};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parses `1,234.50`, `₹1,234.50`, `$12` and accounting-style `(12.00)`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '(' | ')'))
        .collect();
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

/// Accepts ISO `YYYY-MM-DD` and day-first `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn is_duplicate_row(conn: &Connection, user_id: i64, row: &TransactionInput) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM transactions WHERE user_id = ?1 AND date = ?2 AND type = ?3 \
         AND amount = ?4 AND description = ?5",
    )?;
    Ok(stmt.exists(rusqlite::params![
        user_id,
        row.date,
        row.txn_type,
        row.amount,
        row.description.trim()
    ])?)
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    #[serde(rename = "type")]
    txn_type: String,
    amount: String,
    description: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    payment_method: Option<String>,
}

impl CsvRow {
    fn into_input(self) -> std::result::Result<TransactionInput, String> {
        let date = parse_date(&self.date).ok_or_else(|| format!("bad date '{}'", self.date))?;
        let txn_type: TransactionType = self.txn_type.parse().map_err(|e| format!("{e}"))?;
        let amount = parse_amount(&self.amount)
            .map(f64::abs)
            .filter(|a| *a > 0.0)
            .ok_or_else(|| format!("bad amount '{}'", self.amount))?;
        let payment_method = match self.payment_method.as_deref().map(str::trim) {
            None | Some("") => PaymentMethod::Other,
            Some(m) => m.parse().map_err(|e| format!("{e}"))?,
        };
        Ok(TransactionInput {
            txn_type,
            amount,
            description: self.description,
            date,
            payment_method,
            category: self.category.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub duplicate_file: bool,
}

/// Imports a ledger CSV with a `date,type,amount,description[,category,payment_method]`
/// header. The same file is never imported twice for a user, and rows that
/// already exist in the ledger are skipped.
pub fn import_file(conn: &Connection, user_id: i64, file_path: &Path) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    {
        let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND user_id = ?2")?;
        if stmt.exists(rusqlite::params![checksum, user_id])? {
            log::info!("{} already imported (checksum {checksum})", file_path.display());
            return Ok(ImportResult {
                duplicate_file: true,
                ..Default::default()
            });
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(file_path)?;

    let mut result = ImportResult::default();
    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<CsvRow>().enumerate() {
        let parsed = record
            .map_err(|e| e.to_string())
            .and_then(CsvRow::into_input);
        match parsed {
            Ok(input) => rows.push(input),
            Err(reason) => {
                log::warn!("{}: skipping row {}: {reason}", file_path.display(), line + 2);
                result.invalid += 1;
            }
        }
    }

    let tx = conn.unchecked_transaction()?;
    let filename = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    tx.execute(
        "INSERT INTO imports (user_id, filename, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, filename, checksum],
    )?;
    let import_id = tx.last_insert_rowid();

    for row in &rows {
        if is_duplicate_row(&tx, user_id, row)? {
            result.skipped += 1;
            continue;
        }
        ledger::insert(&tx, user_id, row, Some(import_id))?;
        result.imported += 1;
    }
    tx.execute(
        "UPDATE imports SET record_count = ?1 WHERE id = ?2",
        rusqlite::params![result.imported as i64, import_id],
    )?;
    tx.commit()?;

    log::info!(
        "imported {} rows from {} ({} skipped, {} invalid)",
        result.imported,
        filename,
        result.skipped,
        result.invalid
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    date: NaiveDate,
    #[serde(rename = "type")]
    txn_type: TransactionType,
    amount: f64,
    description: &'a str,
    category: &'a str,
    payment_method: PaymentMethod,
}

/// Writes ledger rows in the same layout `import_file` reads.
pub fn export_csv<W: Write>(rows: &[Transaction], out: W) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    for t in rows {
        writer.serialize(CsvRecord {
            date: t.date,
            txn_type: t.txn_type,
            amount: t.amount,
            description: &t.description,
            category: &t.category,
            payment_method: t.payment_method,
        })?;
    }
    writer.flush()?;
    Ok(rows.len())
}
