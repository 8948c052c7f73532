use anyhow::{Result, bail};

/// Print the stored form of `password` for role `name`.
pub fn run(name: &str, password: &str) -> Result<bool> {
    if name.is_empty() {
        bail!("Role name must not be empty");
    }
    println!("{}", declarative::salted_hash(password, name));
    Ok(true)
}
