extern crate keyring;

use std::error::Error;

pub fn get_token(remote_address: &str, username: &str) -> Result<String, Box<dyn Error>> {
    let service = format!("flowatch::{}", remote_address);
    let entry = keyring::Entry::new(&service, username);
    log::info!(
        "Get token for service '{}' and user '{}'",
        &service,
        &username
    );
    Ok(entry.get_password()?)
}

pub fn set_token(remote_address: &str, username: &str, token: &str) -> Result<(), Box<dyn Error>> {
    let service = format!("flowatch::{}", remote_address);
    let entry = keyring::Entry::new(&service, username);
    log::info!(
        "Store token for service '{}' and user '{}'",
        &service,
        &username
    );
    entry.set_password(token)?;
    Ok(())
}
