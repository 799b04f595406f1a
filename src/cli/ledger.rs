use std::path::Path;

use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{print_json, today, Workspace};
use crate::error::Result;
use crate::importer;
use crate::ledger::{self, LedgerFilter, TransactionInput};
use crate::models::{PaymentMethod, Permission, TransactionType};
use crate::schedule::YearMonth;

fn amount_cell(ws: &Workspace, txn_type: TransactionType, amount: f64) -> Cell {
    match txn_type {
        TransactionType::Income => Cell::new(format!("+{}", ws.money(amount)).green()),
        TransactionType::Expense => Cell::new(format!("-{}", ws.money(amount)).red()),
    }
}

pub fn add(
    amount: f64,
    txn_type: TransactionType,
    description: String,
    date: Option<NaiveDate>,
    method: PaymentMethod,
    category: String,
) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let input = TransactionInput {
        txn_type,
        amount,
        description,
        date: date.unwrap_or_else(today),
        payment_method: method,
        category,
    };
    let t = ledger::add(&ws.conn, ws.user_id(), &input)?;
    println!(
        "Recorded {} {} on {}: {} [{}]",
        t.txn_type,
        ws.money(t.amount),
        t.date,
        t.description,
        t.category
    );
    Ok(())
}

pub fn list(filter: LedgerFilter, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let rows = ledger::list(&ws.conn, ws.user_id(), &filter)?;
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No ledger entries match.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Category", "Method", "Amount"]);
    let (mut income, mut expense) = (0.0, 0.0);
    for t in &rows {
        match t.txn_type {
            TransactionType::Income => income += t.amount,
            TransactionType::Expense => expense += t.amount,
        }
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(t.date),
            Cell::new(&t.description),
            Cell::new(&t.category),
            Cell::new(t.payment_method),
            amount_cell(&ws, t.txn_type, t.amount),
        ]);
    }
    println!("Ledger\n{table}");
    println!(
        "Income {}  Expense {}  Net {}",
        ws.money(income).green(),
        ws.money(expense).red(),
        ws.money(income - expense).bold()
    );
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let t = ledger::delete(&ws.conn, ws.user_id(), id)?;
    println!("Deleted {} {} on {}: {}", t.txn_type, ws.money(t.amount), t.date, t.description);
    Ok(())
}

pub fn import(file: &str) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let path = Path::new(file);
    let result = importer::import_file(&ws.conn, ws.user_id(), path)?;
    if result.duplicate_file {
        println!("{} was already imported; nothing to do.", path.display());
        return Ok(());
    }
    println!("Imported {} transaction(s) from {}", result.imported, path.display());
    if result.skipped > 0 {
        println!("Skipped {} duplicate row(s).", result.skipped);
    }
    if result.invalid > 0 {
        println!("{}", format!("Ignored {} invalid row(s); see the warnings above.", result.invalid).yellow());
    }
    Ok(())
}

pub fn export(month: Option<YearMonth>, output: Option<String>) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let filter = LedgerFilter {
        month,
        ..Default::default()
    };
    let mut rows = ledger::list(&ws.conn, ws.user_id(), &filter)?;
    rows.reverse();

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            let count = importer::export_csv(&rows, file)?;
            println!("Exported {count} transaction(s) to {path}");
        }
        None => {
            importer::export_csv(&rows, std::io::stdout().lock())?;
        }
    }
    Ok(())
}
