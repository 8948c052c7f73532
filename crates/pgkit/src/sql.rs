//! SQL text for role statements.
//!
//! psql receives statements as a single `-c` argument, so every name and
//! value is quoted here rather than bound as a parameter.

use declarative::{RoleAttributes, RoleKind};

/// Quote an identifier (`"name"`).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal (`'value'`).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn flag(value: Option<bool>, on: &'static str, off: &'static str) -> Option<String> {
    value.map(|v| if v { on } else { off }.to_string())
}

/// Role options (`LOGIN`, `PASSWORD ...`, ...) in a stable order.
fn role_options(attrs: &RoleAttributes) -> Vec<String> {
    let mut options: Vec<String> = [
        flag(attrs.superuser, "SUPERUSER", "NOSUPERUSER"),
        flag(attrs.createdb, "CREATEDB", "NOCREATEDB"),
        flag(attrs.createrole, "CREATEROLE", "NOCREATEROLE"),
        flag(attrs.inherit, "INHERIT", "NOINHERIT"),
        flag(attrs.login, "LOGIN", "NOLOGIN"),
        flag(attrs.replication, "REPLICATION", "NOREPLICATION"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if let Some(limit) = attrs.connection_limit {
        options.push(format!("CONNECTION LIMIT {limit}"));
    }
    if let Some(at) = attrs.valid_until {
        options.push(format!("VALID UNTIL {}", quote_literal(&at.to_rfc3339())));
    }
    match attrs.credential.as_deref() {
        Some("") => options.push("PASSWORD NULL".to_string()),
        Some(credential) => {
            options.push(format!("ENCRYPTED PASSWORD {}", quote_literal(credential)));
        }
        None => {}
    }
    options
}

fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE ROLE` (or `CREATE USER`) with every given attribute.
///
/// Groups are created `NOLOGIN` unless login is asked for.
pub fn create_role(kind: RoleKind, name: &str, attrs: &RoleAttributes) -> String {
    let keyword = match kind {
        RoleKind::Group => "ROLE",
        RoleKind::User => "USER",
    };
    let mut sql = format!("CREATE {keyword} {}", quote_ident(name));

    let mut options = role_options(attrs);
    if kind == RoleKind::Group && attrs.login.is_none() {
        options.push("NOLOGIN".to_string());
    }
    if !options.is_empty() {
        sql.push_str(" WITH ");
        sql.push_str(&options.join(" "));
    }
    if let Some(groups) = attrs.groups.as_deref().filter(|g| !g.is_empty()) {
        sql.push_str(" IN ROLE ");
        sql.push_str(&quoted_list(groups));
    }
    sql
}

/// `ALTER ROLE` plus `GRANT` statements for the given attribute changes.
pub fn update_role(name: &str, attrs: &RoleAttributes) -> Vec<String> {
    let mut statements = Vec::new();

    let options = role_options(attrs);
    if !options.is_empty() {
        statements.push(format!(
            "ALTER ROLE {} WITH {}",
            quote_ident(name),
            options.join(" ")
        ));
    }
    if let Some(groups) = attrs.groups.as_deref().filter(|g| !g.is_empty()) {
        statements.push(format!("GRANT {} TO {}", quoted_list(groups), quote_ident(name)));
    }
    statements
}

/// `DROP ROLE`.
pub fn drop_role(name: &str) -> String {
    format!("DROP ROLE {}", quote_ident(name))
}

/// Existence check returning `1` when the role exists.
pub fn role_exists(name: &str) -> String {
    format!("SELECT 1 FROM pg_roles WHERE rolname = {}", quote_literal(name))
}

/// Query returning one JSON object describing the role, or no row.
///
/// Reading the stored password requires `pg_authid`, which only superusers
/// may select from.
pub fn role_query(name: &str, with_credential: bool) -> String {
    let (password, join) = if with_credential {
        ("a.rolpassword", " JOIN pg_authid a ON a.oid = r.oid")
    } else {
        ("NULL::text", "")
    };

    format!(
        "SELECT json_build_object(\
         'name', r.rolname, \
         'superuser', r.rolsuper, \
         'inherit', r.rolinherit, \
         'createrole', r.rolcreaterole, \
         'createdb', r.rolcreatedb, \
         'login', r.rolcanlogin, \
         'replication', r.rolreplication, \
         'connection_limit', r.rolconnlimit, \
         'valid_until', CASE WHEN r.rolvaliduntil = 'infinity' THEN NULL ELSE r.rolvaliduntil END, \
         'password', {password}, \
         'groups', COALESCE((SELECT json_agg(g.rolname ORDER BY g.rolname) \
         FROM pg_auth_members m JOIN pg_roles g ON g.oid = m.roleid \
         WHERE m.member = r.oid), '[]'::json)) \
         FROM pg_roles r{join} WHERE r.rolname = {}",
        quote_literal(name)
    )
}
