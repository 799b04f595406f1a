use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::HouseSavingsEntry;
use crate::validation;

const COLUMNS: &str = "id, user_id, date, amount, notes";

fn row_to_entry(row: &Row) -> rusqlite::Result<HouseSavingsEntry> {
    Ok(HouseSavingsEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        amount: row.get(3)?,
        notes: row.get(4)?,
    })
}

pub fn add(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
    amount: f64,
    notes: Option<&str>,
) -> Result<HouseSavingsEntry> {
    validation::positive_amount("Amount", amount)?;
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());
    conn.execute(
        "INSERT INTO house_savings (user_id, date, amount, notes) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![user_id, date, amount, notes],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("added house savings entry {id} of {amount} on {date}");
    get(conn, user_id, id)
}

pub fn get(conn: &Connection, user_id: i64, id: i64) -> Result<HouseSavingsEntry> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM house_savings WHERE id = ?1 AND user_id = ?2"),
        [id, user_id],
        row_to_entry,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("House savings entry", id))
}

/// Entries oldest first, optionally bounded to `[from, to]`.
pub fn list(
    conn: &Connection,
    user_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<HouseSavingsEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM house_savings \
         WHERE user_id = ?1 AND (?2 IS NULL OR date >= ?2) AND (?3 IS NULL OR date <= ?3) \
         ORDER BY date, id"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, from, to], row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, user_id: i64, id: i64) -> Result<HouseSavingsEntry> {
    let entry = get(conn, user_id, id)?;
    conn.execute("DELETE FROM house_savings WHERE id = ?1 AND user_id = ?2", [id, user_id])?;
    log::info!("deleted house savings entry {id}");
    Ok(entry)
}

pub fn total(conn: &Connection, user_id: i64) -> Result<f64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM house_savings WHERE user_id = ?1",
        [user_id],
        |r| r.get(0),
    )?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsMonth {
    pub month: String,
    pub amount: f64,
    pub entries: i64,
    pub running_total: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsSummary {
    pub total: f64,
    pub entries: i64,
    /// Average over months that had at least one entry.
    pub monthly_average: f64,
    pub months: Vec<SavingsMonth>,
}

pub fn summary(conn: &Connection, user_id: i64) -> Result<SavingsSummary> {
    let mut stmt = conn.prepare(
        "SELECT substr(date, 1, 7) AS month, SUM(amount), COUNT(*) \
         FROM house_savings WHERE user_id = ?1 GROUP BY month ORDER BY month",
    )?;
    let raw: Vec<(String, f64, i64)> = stmt
        .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut running = 0.0f64;
    let mut months = Vec::with_capacity(raw.len());
    for (month, amount, entries) in raw {
        running += amount;
        months.push(SavingsMonth {
            month,
            amount,
            entries,
            running_total: running,
        });
    }

    let entries = months.iter().map(|m| m.entries).sum();
    let monthly_average = if months.is_empty() { 0.0 } else { running / months.len() as f64 };
    Ok(SavingsSummary {
        total: running,
        entries,
        monthly_average,
        months,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::users;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup() -> (tempfile::TempDir, Connection, i64) {
        let (dir, conn) = test_db();
        let user = users::register(&conn, "Asha", "asha@example.com", 0.0, "INR").unwrap();
        (dir, conn, user.id)
    }

    #[test]
    fn test_add_rejects_zero() {
        let (_dir, conn, uid) = setup();
        assert!(add(&conn, uid, d(2025, 1, 1), 0.0, None).is_err());
    }

    #[test]
    fn test_blank_notes_stored_as_none() {
        let (_dir, conn, uid) = setup();
        let e = add(&conn, uid, d(2025, 1, 1), 100.0, Some("   ")).unwrap();
        assert!(e.notes.is_none());
    }

    #[test]
    fn test_list_range() {
        let (_dir, conn, uid) = setup();
        add(&conn, uid, d(2025, 1, 10), 5000.0, None).unwrap();
        add(&conn, uid, d(2025, 2, 10), 7000.0, Some("bonus")).unwrap();
        add(&conn, uid, d(2025, 3, 10), 5000.0, None).unwrap();
        assert_eq!(list(&conn, uid, None, None).unwrap().len(), 3);
        let feb = list(&conn, uid, Some(d(2025, 2, 1)), Some(d(2025, 2, 28))).unwrap();
        assert_eq!(feb.len(), 1);
        assert_eq!(feb[0].notes.as_deref(), Some("bonus"));
        assert_eq!(total(&conn, uid).unwrap(), 17000.0);
    }

    #[test]
    fn test_summary_running_total() {
        let (_dir, conn, uid) = setup();
        add(&conn, uid, d(2025, 1, 10), 5000.0, None).unwrap();
        add(&conn, uid, d(2025, 1, 25), 1000.0, None).unwrap();
        add(&conn, uid, d(2025, 3, 10), 3000.0, None).unwrap();
        let s = summary(&conn, uid).unwrap();
        assert_eq!(s.total, 9000.0);
        assert_eq!(s.entries, 3);
        assert_eq!(s.months.len(), 2);
        assert_eq!(s.months[0].month, "2025-01");
        assert_eq!(s.months[0].amount, 6000.0);
        assert_eq!(s.months[1].running_total, 9000.0);
        assert_eq!(s.monthly_average, 4500.0);
    }

    #[test]
    fn test_empty_summary() {
        let (_dir, conn, uid) = setup();
        let s = summary(&conn, uid).unwrap();
        assert_eq!(s.total, 0.0);
        assert_eq!(s.monthly_average, 0.0);
        assert!(s.months.is_empty());
    }

    #[test]
    fn test_delete_is_scoped() {
        let (_dir, conn, uid) = setup();
        let other = users::register(&conn, "Ravi", "ravi@example.com", 0.0, "INR").unwrap();
        let e = add(&conn, uid, d(2025, 1, 10), 5000.0, None).unwrap();
        assert!(delete(&conn, other.id, e.id).is_err());
        delete(&conn, uid, e.id).unwrap();
        assert_eq!(total(&conn, uid).unwrap(), 0.0);
    }
}
