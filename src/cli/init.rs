use std::path::PathBuf;

use crate::db::{get_connection, init_db, set_metadata};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path, DB_FILE};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    let resolved = match data_dir {
        Some(dir) => PathBuf::from(shellexpand_path(&dir)),
        None => PathBuf::from(&settings.data_dir),
    };
    std::fs::create_dir_all(&resolved)?;

    let db_path = resolved.join(DB_FILE);
    let existed = db_path.exists();
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    if !existed {
        set_metadata(&conn, "created_at", &chrono::Local::now().to_rfc3339())?;
    }

    let data_dir = resolved.to_string_lossy().to_string();
    if settings.data_dir != data_dir {
        settings.active_user_id = None;
    }
    settings.data_dir = data_dir;
    save_settings(&settings)?;

    if existed {
        println!("Using existing database at {}", db_path.display());
    } else {
        println!("Initialized emitrack at {}", resolved.display());
    }
    println!("Next: `emitrack register <name> --email <email>` or `emitrack demo`.");
    Ok(())
}
