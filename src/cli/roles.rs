use comfy_table::{Cell, Table};

use crate::cli::{print_json, Workspace};
use crate::error::Result;
use crate::models::{Permission, Role};
use crate::roles;

pub fn list(json: bool) -> Result<()> {
    let ws = Workspace::open(Permission::ViewUsers)?;
    let all = roles::list(&ws.conn)?;
    if json {
        return print_json(&all);
    }

    let mut table = Table::new();
    let mut header = vec!["Permission".to_string()];
    header.extend(Role::ALL.iter().map(|r| r.to_string()));
    table.set_header(header);
    for permission in Permission::ALL {
        let mut row = vec![Cell::new(permission)];
        for rp in &all {
            let mark = if rp.permissions.contains(permission) { "yes" } else { "" };
            row.push(Cell::new(mark));
        }
        table.add_row(row);
    }
    println!("Role permissions\n{table}");
    Ok(())
}

pub fn grant(role: Role, permission: Permission) -> Result<()> {
    let ws = Workspace::open(Permission::ManageRoles)?;
    if roles::grant(&ws.conn, &ws.session.user, role, permission)? {
        println!("Granted {permission} to {role}");
    } else {
        println!("{role} already has {permission}");
    }
    Ok(())
}

pub fn revoke(role: Role, permission: Permission) -> Result<()> {
    let ws = Workspace::open(Permission::ManageRoles)?;
    if roles::revoke(&ws.conn, &ws.session.user, role, permission)? {
        println!("Revoked {permission} from {role}");
    } else {
        println!("{role} did not have {permission}");
    }
    Ok(())
}
