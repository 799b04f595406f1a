use chrono::Datelike;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{print_json, today, Workspace};
use crate::error::Result;
use crate::fmt::{date_opt, money, pct};
use crate::models::Permission;
use crate::reports;
use crate::savings;
use crate::schedule::YearMonth;

pub fn monthly(year: Option<i32>, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ViewReports)?;
    let year = year.unwrap_or_else(|| today().year());
    let data = reports::monthly(&ws.conn, ws.user_id(), year)?;
    if json {
        return print_json(&data);
    }

    let mut table = Table::new();
    table.set_header(vec!["Month", "Income", "Expense", "Net", "Running Net"]);
    for m in &data.months {
        let net = if m.net >= 0.0 {
            ws.money(m.net).green()
        } else {
            ws.money(m.net).red()
        };
        table.add_row(vec![
            Cell::new(&m.month),
            Cell::new(ws.money(m.income)),
            Cell::new(ws.money(m.expense)),
            Cell::new(net),
            Cell::new(ws.money(m.running_net)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(ws.money(data.totals.income)),
        Cell::new(ws.money(data.totals.expense)),
        Cell::new(ws.money(data.totals.net).bold()),
        Cell::new(""),
    ]);
    println!("Monthly summary {year}\n{table}");
    Ok(())
}

pub fn categories(month: Option<YearMonth>, year: Option<i32>, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ViewReports)?;
    let (year, month) = match month {
        Some(m) => (m.year, Some(m.month)),
        None => (year.unwrap_or_else(|| today().year()), None),
    };
    let data = reports::categories(&ws.conn, ws.user_id(), year, month)?;
    if json {
        return print_json(&data);
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "%", "Count"]);
    for item in &data.categories {
        table.add_row(vec![
            Cell::new(&item.name),
            Cell::new(ws.money(item.total)),
            Cell::new(pct(item.pct)),
            Cell::new(item.count),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(ws.money(data.total)),
        Cell::new(""),
        Cell::new(""),
    ]);
    println!("Expenses by category ({})\n{table}", data.period);
    Ok(())
}

pub fn emis(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ViewReports)?;
    let data = reports::emi_report(&ws.conn, ws.user_id(), today())?;
    if json {
        return print_json(&data);
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Type", "Paid", "Progress", "Remaining", "Next Due", "Status"]);
    for r in &data.rows {
        let total = if r.total == 0 { "-".to_string() } else { r.total.to_string() };
        let status = if r.overdue {
            Cell::new("overdue".red().bold())
        } else {
            Cell::new(r.status)
        };
        table.add_row(vec![
            Cell::new(&r.name),
            Cell::new(r.emi_type),
            Cell::new(format!("{} / {total}", r.paid)),
            Cell::new(pct(r.progress)),
            Cell::new(ws.money(r.remaining_amount)),
            Cell::new(date_opt(r.next_due)),
            status,
        ]);
    }
    println!("EMI report\n{table}");
    println!("Monthly outflow:    {}", ws.money(data.monthly_outflow));
    println!("Total outstanding:  {}", ws.money(data.total_outstanding).bold());
    if data.overdue > 0 {
        println!("{}", format!("{} EMI(s) overdue", data.overdue).red());
    }
    Ok(())
}

pub fn payments(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ViewReports)?;
    let data = reports::payment_report(&ws.conn, ws.user_id(), today())?;
    if json {
        return print_json(&data);
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Category", "Amount", "Paid", "Pending", "Remaining", "Next Due", "Status"]);
    for s in &data.rows {
        let p = &s.payment;
        let pending = if s.pending > 0 {
            Cell::new(s.pending.to_string().red())
        } else {
            Cell::new(s.pending)
        };
        table.add_row(vec![
            Cell::new(&p.name),
            Cell::new(p.category),
            Cell::new(ws.money(p.amount)),
            Cell::new(p.paid_count),
            pending,
            Cell::new(s.remaining),
            Cell::new(date_opt(s.next_due)),
            Cell::new(p.status),
        ]);
    }
    println!("Payment report\n{table}");
    println!("Monthly expenses:  {}", ws.money(data.monthly_expense));
    println!("Monthly savings:   {}", ws.money(data.monthly_savings));
    println!("Pending:           {}", data.pending);
    Ok(())
}

pub fn savings(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ViewReports)?;
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
    println!("House savings report\n{table}");
    println!("Total saved:      {}", ws.money(data.total).bold());
    println!("Monthly average:  {}", ws.money(data.monthly_average));
    println!("Entries:          {}", data.entries);
    Ok(())
}

pub fn users(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ViewReports)?;
    let rows = reports::users_overview(&ws.conn, &ws.session.user)?;
    if json {
        return print_json(&rows);
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Name", "Email", "Role", "Monthly Income", "EMIs", "Active", "Payments", "EMI Outstanding",
    ]);
    for u in &rows {
        table.add_row(vec![
            Cell::new(u.id),
            Cell::new(&u.name),
            Cell::new(&u.email),
            Cell::new(u.role),
            Cell::new(money(u.monthly_income, &u.currency)),
            Cell::new(u.emis),
            Cell::new(u.active_emis),
            Cell::new(u.payments),
            Cell::new(money(u.emi_outstanding, &u.currency)),
        ]);
    }
    println!("Users overview\n{table}");
    Ok(())
}
