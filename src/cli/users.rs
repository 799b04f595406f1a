use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::cli::{open_db, print_json, Workspace};
use crate::error::Result;
use crate::fmt::money;
use crate::models::{Permission, Role, User};
use crate::roles;
use crate::session;
use crate::settings::save_settings;
use crate::users::{self, ProfileUpdate};

fn role_cell(role: Role) -> Cell {
    match role {
        Role::SuperAdmin => Cell::new(role.as_str().red().bold()),
        Role::Admin => Cell::new(role.as_str().yellow()),
        Role::User => Cell::new(role.as_str()),
    }
}

pub fn register(name: &str, email: &str, income: f64, currency: Option<&str>) -> Result<()> {
    let (mut settings, conn) = open_db()?;
    let currency = currency.unwrap_or(&settings.default_currency).to_string();
    let user = users::register(&conn, name, email, income, &currency)?;

    // Registering also logs in, like the web app's sign-up flow.
    settings.active_user_id = Some(user.id);
    save_settings(&settings)?;

    println!("Registered {} <{}> as {}", user.name, user.email, user.role);
    if user.role == Role::SuperAdmin {
        println!("{}", "First account on this database: you are the super admin.".yellow());
    }
    Ok(())
}

pub fn login(email: &str) -> Result<()> {
    let (mut settings, conn) = open_db()?;
    let user = session::login(&conn, &mut settings, email)?;
    save_settings(&settings)?;
    println!("Logged in as {} <{}>", user.name, user.email);
    Ok(())
}

pub fn logout() -> Result<()> {
    let mut settings = crate::settings::load_settings();
    if session::logout(&mut settings) {
        save_settings(&settings)?;
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

#[derive(Serialize)]
struct WhoAmI<'a> {
    user: &'a User,
    permissions: Vec<Permission>,
}

pub fn whoami(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let user = &ws.session.user;
    let permissions = roles::permissions_for(&ws.conn, user.role)?;
    if json {
        return print_json(&WhoAmI { user, permissions });
    }

    println!("{} <{}>", user.name.bold(), user.email);
    println!("Role:            {}", user.role);
    println!("Monthly income:  {}", ws.money(user.monthly_income));
    println!("Currency:        {}", user.currency);
    let names: Vec<&str> = permissions.iter().map(Permission::as_str).collect();
    println!("Permissions:     {}", names.join(", "));
    Ok(())
}

pub fn profile(name: Option<String>, income: Option<f64>, currency: Option<String>) -> Result<()> {
    let ws = Workspace::open(Permission::ManageOwnData)?;
    let changes = ProfileUpdate {
        name,
        monthly_income: income,
        currency,
    };
    let user = users::update_profile(&ws.conn, ws.user_id(), &changes)?;
    println!("Name:            {}", user.name);
    println!("Monthly income:  {}", money(user.monthly_income, &user.currency));
    println!("Currency:        {}", user.currency);
    Ok(())
}

pub fn list(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ViewUsers)?;
    let all = users::list(&ws.conn)?;
    if json {
        return print_json(&all);
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Email", "Role", "Monthly Income", "Joined"]);
    for u in &all {
        let marker = if u.id == ws.user_id() { " *" } else { "" };
        table.add_row(vec![
            Cell::new(u.id),
            Cell::new(format!("{}{marker}", u.name)),
            Cell::new(&u.email),
            role_cell(u.role),
            Cell::new(money(u.monthly_income, &u.currency)),
            Cell::new(u.created_at.get(..10).unwrap_or(&u.created_at)),
        ]);
    }
    println!("Users\n{table}");
    Ok(())
}

pub fn set_role(id: i64, role: Role) -> Result<()> {
    let ws = Workspace::open(Permission::ManageUsers)?;
    let user = users::set_role(&ws.conn, &ws.session.user, id, role)?;
    println!("{} <{}> is now {}", user.name, user.email, user.role);
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let ws = Workspace::open(Permission::ManageUsers)?;
    let user = users::delete(&ws.conn, &ws.session.user, id)?;
    println!("Deleted {} <{}> and all of their data.", user.name, user.email);
    Ok(())
}
