use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{print_json, today, Workspace};
use crate::error::Result;
use crate::models::Permission;
use crate::savings;

pub fn add(amount: f64, date: Option<NaiveDate>, notes: Option<String>) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let entry = savings::add(
        &ws.conn,
        ws.user_id(),
        date.unwrap_or_else(today),
        amount,
        notes.as_deref(),
    )?;
    let total = savings::total(&ws.conn, ws.user_id())?;
    println!("Saved {} on {} (entry {})", ws.money(entry.amount), entry.date, entry.id);
    println!("House savings total: {}", ws.money(total).bold());
    Ok(())
}

pub fn list(from: Option<NaiveDate>, to: Option<NaiveDate>, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let rows = savings::list(&ws.conn, ws.user_id(), from, to)?;
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No house savings entries.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Amount", "Notes"]);
    for e in &rows {
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(e.date),
            Cell::new(ws.money(e.amount)),
            Cell::new(e.notes.as_deref().unwrap_or("")),
        ]);
    }
    let total: f64 = rows.iter().map(|e| e.amount).sum();
    table.add_row(vec![
        Cell::new(""),
        Cell::new("Total".bold()),
        Cell::new(ws.money(total)),
        Cell::new(""),
    ]);
    println!("House savings\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let entry = savings::delete(&ws.conn, ws.user_id(), id)?;
    println!("Deleted savings entry {} ({} on {})", entry.id, ws.money(entry.amount), entry.date);
    Ok(())
}

pub fn summary(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let data = savings::summary(&ws.conn, ws.user_id())?;
    if json {
        return print_json(&data);
    }

    let mut table = Table::new();
    table.set_header(vec!["Month", "Saved", "Entries", "Running Total"]);
    for m in &data.months {
        table.add_row(vec![
            Cell::new(&m.month),
            Cell::new(ws.money(m.amount)),
            Cell::new(m.entries),
            Cell::new(ws.money(m.running_total)),
        ]);
    }
    println!("House savings by month\n{table}");
    println!("Total:            {}", ws.money(data.total).bold());
    println!("Monthly average:  {}", ws.money(data.monthly_average));
    Ok(())
}
