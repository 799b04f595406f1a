use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{print_json, today, Workspace};
use crate::error::Result;
use crate::forecast;
use crate::models::Permission;

pub fn run(months: Option<u32>, json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let months = months.unwrap_or(ws.settings.forecast_months);
    let data = forecast::build(&ws.conn, &ws.session.user, today(), months)?;
    if json {
        return print_json(&data);
    }

    let mut table = Table::new();
    table.set_header(vec!["Month", "EMIs", "Expenses", "Savings", "Total", "Surplus"]);
    for m in &data.months {
        let surplus = if m.surplus >= 0.0 {
            ws.money(m.surplus).green()
        } else {
            ws.money(m.surplus).red()
        };
        table.add_row(vec![
            Cell::new(&m.month),
            Cell::new(ws.money(m.emi_outflow)),
            Cell::new(ws.money(m.expense_payments)),
            Cell::new(ws.money(m.savings_payments)),
            Cell::new(ws.money(m.total)),
            Cell::new(surplus),
        ]);
    }
    println!("Forecast against {} monthly income\n{table}", ws.money(data.monthly_income));
    println!("Total outflow over {months} months: {}", ws.money(data.total_outflow).bold());
    Ok(())
}
