use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{print_json, today, Workspace};
use crate::dashboard::{self, Due};
use crate::error::Result;
use crate::models::Permission;

fn dues_table(ws: &Workspace, dues: &[Due]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Due", "Kind", "ID", "Name", "Amount"]);
    for d in dues {
        table.add_row(vec![
            Cell::new(d.due_date),
            Cell::new(d.kind),
            Cell::new(d.id),
            Cell::new(&d.name),
            Cell::new(ws.money(d.amount)),
        ]);
    }
    table
}

pub fn run(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let today = today();
    let dash = dashboard::build(
        &ws.conn,
        &ws.session.user,
        today,
        ws.settings.upcoming_window_days,
    )?;
    if json {
        return print_json(&dash);
    }

    println!("{} ({today})", format!("Dashboard for {}", ws.session.user.name).bold());
    println!();

    let mut table = Table::new();
    table.set_header(vec!["Monthly", "Amount"]);
    table.add_row(vec![Cell::new("Income"), Cell::new(ws.money(dash.monthly_income))]);
    table.add_row(vec![
        Cell::new(format!("EMIs ({} active)", dash.active_emis)),
        Cell::new(ws.money(dash.monthly_emi_outflow)),
    ]);
    table.add_row(vec![
        Cell::new("Recurring expenses"),
        Cell::new(ws.money(dash.monthly_expense_payments)),
    ]);
    table.add_row(vec![
        Cell::new("Savings commitments"),
        Cell::new(ws.money(dash.monthly_savings_payments)),
    ]);
    let disposable = if dash.disposable_income >= 0.0 {
        ws.money(dash.disposable_income).green().bold()
    } else {
        ws.money(dash.disposable_income).red().bold()
    };
    table.add_row(vec![Cell::new("Disposable income".bold()), Cell::new(disposable)]);
    println!("{table}");

    println!();
    println!("EMI outstanding:     {}", ws.money(dash.total_emi_outstanding));
    println!("House savings:       {}", ws.money(dash.house_savings_total));
    println!("Pending payments:    {}", dash.pending_payments);
    println!(
        "This month:          income {}, expense {}, net {}",
        ws.money(dash.this_month.income),
        ws.money(dash.this_month.expense),
        ws.money(dash.this_month.net)
    );

    if !dash.overdue.is_empty() {
        println!();
        println!("{}", "Overdue".red().bold());
        println!("{}", dues_table(&ws, &dash.overdue));
    }
    println!();
    if dash.upcoming.is_empty() {
        println!("Nothing due in the next {} days.", ws.settings.upcoming_window_days);
    } else {
        println!("Due in the next {} days", ws.settings.upcoming_window_days);
        println!("{}", dues_table(&ws, &dash.upcoming));
    }
    Ok(())
}
