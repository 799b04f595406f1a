use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{print_json, today, Workspace};
use crate::error::Result;
use crate::fmt::date_opt;
use crate::models::{PaymentCategory, PaymentKind, PaymentStatus, Permission, TxnStatus};
use crate::payments::{self, PaymentInput, PaymentSummary, PaymentUpdate};

fn status_cell(s: &PaymentSummary) -> Cell {
    match s.payment.status {
        PaymentStatus::Active if s.pending > 0 => Cell::new(format!("{} pending", s.pending).red().bold()),
        PaymentStatus::Active => Cell::new("active".green()),
        PaymentStatus::Paused => Cell::new("paused".yellow()),
        PaymentStatus::Completed => Cell::new("completed".dimmed()),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn add(
    name: String,
    amount: f64,
    day: u32,
    start: NaiveDate,
    end: Option<NaiveDate>,
    schedule: PaymentKind,
    category: PaymentCategory,
    paid: u32,
    notes: Option<String>,
) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let input = PaymentInput {
        name,
        emi_type: schedule,
        category,
        amount,
        emi_day: day,
        start_date: start,
        end_date: end,
        paid_count: paid,
        notes,
    };
    let p = payments::create(&ws.conn, ws.user_id(), &input)?;
    println!(
        "Added {} payment {}: {} ({} on day {})",
        p.emi_type,
        p.id,
        p.name,
        ws.money(p.amount),
        p.emi_day
    );
    Ok(())
}

pub fn list(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let today = today();
    let rows: Vec<PaymentSummary> = payments::list(&ws.conn, ws.user_id())?
        .into_iter()
        .map(|p| payments::summarize(p, today))
        .collect();
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No payments yet. Add one with `emitrack payments add`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Name", "Schedule", "Category", "Amount", "Day", "Paid", "Remaining", "Next Due", "Status",
    ]);
    for s in &rows {
        let p = &s.payment;
        table.add_row(vec![
            Cell::new(p.id),
            Cell::new(&p.name),
            Cell::new(p.emi_type),
            Cell::new(p.category),
            Cell::new(ws.money(p.amount)),
            Cell::new(p.emi_day),
            Cell::new(p.paid_count),
            Cell::new(s.remaining),
            Cell::new(date_opt(s.next_due)),
            status_cell(s),
        ]);
    }
    println!("Payments\n{table}");
    Ok(())
}

pub fn show(id: i64, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let s = payments::summarize(payments::get(&ws.conn, ws.user_id(), id)?, today());
    if json {
        return print_json(&s);
    }

    let p = &s.payment;
    println!("{} (#{})", p.name.bold(), p.id);
    println!("Schedule:   {} {}, day {}", p.emi_type, p.category, p.emi_day);
    println!("Amount:     {}", ws.money(p.amount));
    println!("Period:     {} to {}", p.start_date, date_opt(p.end_date));
    println!("Paid:       {}", p.paid_count);
    println!("Pending:    {}", s.pending);
    println!("Remaining:  {}", s.remaining);
    println!("Next due:   {}", date_opt(s.next_due));
    println!("Status:     {}", p.status);
    if let Some(notes) = &p.notes {
        println!("Notes:      {notes}");
    }
    Ok(())
}

pub fn update(id: i64, changes: PaymentUpdate) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let p = payments::update(&ws.conn, ws.user_id(), id, &changes)?;
    println!("Updated payment {}: {} ({})", p.id, p.name, p.status);
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let p = payments::delete(&ws.conn, ws.user_id(), id)?;
    println!("Deleted payment {}: {}", p.id, p.name);
    Ok(())
}

pub fn pay(id: i64, date: Option<NaiveDate>, amount: Option<f64>) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let paid_on = date.unwrap_or_else(today);
    let (p, txn) = payments::record_payment(&ws.conn, ws.user_id(), id, paid_on, amount)?;
    println!(
        "Paid {} for {} (transaction {}, due {})",
        ws.money(txn.amount),
        p.name,
        txn.id,
        txn.payment_date
    );
    if p.status == PaymentStatus::Completed {
        println!("{}", format!("{} is complete.", p.name).green().bold());
    }
    Ok(())
}

pub fn sync(id: Option<i64>) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let today = today();
    let ids: Vec<i64> = match id {
        Some(id) => vec![id],
        None => payments::list(&ws.conn, ws.user_id())?
            .into_iter()
            .filter(|p| p.status == PaymentStatus::Active)
            .map(|p| p.id)
            .collect(),
    };

    let mut queued = 0;
    for id in ids {
        let created = payments::sync_pending(&ws.conn, ws.user_id(), id, today)?;
        for txn in &created {
            println!("  queued #{} for payment {id}: {} due {}", txn.id, ws.money(txn.amount), txn.payment_date);
        }
        queued += created.len();
    }
    if queued == 0 {
        println!("Nothing to queue; all payments are up to date.");
    } else {
        println!("Queued {queued} pending transaction(s).");
    }
    Ok(())
}

pub fn mark_paid(txn_id: i64) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let p = payments::mark_transaction_paid(&ws.conn, ws.user_id(), txn_id)?;
    println!("Marked transaction {txn_id} paid for {} ({} paid)", p.name, p.paid_count);
    Ok(())
}

pub fn history(id: i64, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let rows = payments::history(&ws.conn, ws.user_id(), id)?;
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No transactions recorded for payment {id}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Amount", "Status"]);
    for t in &rows {
        let status = match t.status {
            TxnStatus::Paid => Cell::new("paid".green()),
            TxnStatus::Pending => Cell::new("pending".yellow()),
        };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(t.payment_date),
            Cell::new(ws.money(t.amount)),
            status,
        ]);
    }
    println!("Payment history\n{table}");
    Ok(())
}
