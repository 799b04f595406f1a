use colored::Colorize;
use comfy_table::{Cell, Table};
use chrono::NaiveDate;

use crate::cli::{print_json, today, Workspace};
use crate::emis::{self, EmiInput, EmiUpdate};
use crate::error::Result;
use crate::fmt::{date_opt, pct};
use crate::models::{Emi, EmiStatus, EmiType, PaymentMethod, PaymentType, Permission};
use crate::validation;

fn status_cell(emi: &Emi, today: NaiveDate) -> Cell {
    if emis::is_overdue(emi, today) {
        return Cell::new("overdue".red().bold());
    }
    match emi.status {
        EmiStatus::Active => Cell::new("active".green()),
        EmiStatus::Completed => Cell::new("completed".dimmed()),
        EmiStatus::Defaulted => Cell::new("defaulted".red()),
    }
}

fn installments_label(emi: &Emi) -> String {
    if emi.total_installments == 0 {
        format!("{} / ongoing", emi.paid_installments)
    } else {
        format!("{} / {}", emi.paid_installments, emi.total_installments)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn add(
    name: String,
    amount: f64,
    emi_type: EmiType,
    payment_type: PaymentType,
    installments: Option<u32>,
    paid: u32,
    start: NaiveDate,
    notes: Option<String>,
) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let installments = validation::installments_or_default(payment_type, installments)?;
    let input = EmiInput {
        name,
        emi_type,
        payment_type,
        emi_amount: amount,
        total_installments: installments,
        paid_installments: paid,
        start_date: start,
        notes,
    };
    let emi = emis::create(&ws.conn, ws.user_id(), &input)?;
    println!(
        "Added EMI {}: {} ({} / month, next due {})",
        emi.id,
        emi.name,
        ws.money(emi.emi_amount),
        date_opt(emi.next_due_date)
    );
    Ok(())
}

pub fn list(status: Option<EmiStatus>, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let rows = emis::list(&ws.conn, ws.user_id(), status)?;
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No EMIs yet. Add one with `emitrack emis add`.");
        return Ok(());
    }

    let today = today();
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Name", "Type", "Amount", "Paid", "Progress", "Remaining", "Next Due", "Status",
    ]);
    for emi in &rows {
        table.add_row(vec![
            Cell::new(emi.id),
            Cell::new(&emi.name),
            Cell::new(emi.emi_type),
            Cell::new(ws.money(emi.emi_amount)),
            Cell::new(installments_label(emi)),
            Cell::new(pct(emis::progress_pct(emi))),
            Cell::new(ws.money(emi.remaining_amount)),
            Cell::new(date_opt(emi.next_due_date)),
            status_cell(emi, today),
        ]);
    }
    let outflow: f64 = rows.iter().map(emis::monthly_outflow).sum();
    println!("EMIs\n{table}");
    println!("Monthly outflow: {}", ws.money(outflow).bold());
    Ok(())
}

pub fn show(id: i64, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let emi = emis::get(&ws.conn, ws.user_id(), id)?;
    if json {
        return print_json(&emi);
    }

    println!("{} (#{})", emi.name.bold(), emi.id);
    println!("Type:          {} / {}", emi.emi_type, emi.payment_type);
    println!("Amount:        {}", ws.money(emi.emi_amount));
    println!("Installments:  {} ({})", installments_label(&emi), pct(emis::progress_pct(&emi)));
    println!("Started:       {}", emi.start_date);
    println!("Next due:      {}", date_opt(emi.next_due_date));
    println!("Remaining:     {}", ws.money(emi.remaining_amount));
    let status = if emis::is_overdue(&emi, today()) {
        "overdue".red().bold().to_string()
    } else {
        emi.status.to_string()
    };
    println!("Status:        {status}");
    if let Some(notes) = &emi.notes {
        println!("Notes:         {notes}");
    }
    Ok(())
}

pub fn update(id: i64, changes: EmiUpdate) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let emi = emis::update(&ws.conn, ws.user_id(), id, &changes)?;
    println!(
        "Updated EMI {}: {} {} ({})",
        emi.id,
        emi.name,
        installments_label(&emi),
        emi.status
    );
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let emi = emis::delete(&ws.conn, ws.user_id(), id)?;
    println!("Deleted EMI {}: {}", emi.id, emi.name);
    Ok(())
}

pub fn pay(id: i64, date: Option<NaiveDate>, method: PaymentMethod) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let paid_on = date.unwrap_or_else(today);
    let emi = emis::record_installment(&ws.conn, ws.user_id(), id, paid_on, method)?;
    println!(
        "Paid {} for {} ({})",
        ws.money(emi.emi_amount),
        emi.name,
        installments_label(&emi)
    );
    if emi.status == EmiStatus::Completed {
        println!("{}", format!("{} is fully paid off.", emi.name).green().bold());
    } else {
        println!("Next due: {}", date_opt(emi.next_due_date));
    }
    Ok(())
}
