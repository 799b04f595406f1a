use crate::db::{get_connection, get_metadata};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::session::Session;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `emitrack init` to set up.");
        return Ok(());
    }

    let size = std::fs::metadata(&db_path)?.len();
    println!("DB size:    {}", format_bytes(size));

    let conn = get_connection(&db_path)?;
    if let Some(created) = get_metadata(&conn, "created_at") {
        println!("Created:    {created}");
    }
    match Session::load(&conn, &settings) {
        Ok(session) => println!(
            "User:       {} <{}> ({})",
            session.user.name, session.user.email, session.user.role
        ),
        Err(_) => println!("User:       (not logged in)"),
    }

    let count = |table: &str| -> Result<i64> {
        Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?)
    };
    println!();
    println!("Users:         {}", count("users")?);
    println!("EMIs:          {}", count("emis")?);
    println!("Payments:      {}", count("payments")?);
    println!("Savings:       {}", count("house_savings")?);
    println!("Transactions:  {}", count("transactions")?);
    Ok(())
}
