use crate::commands::common::{format_listing_lines, listing, Session};
use crate::error::CliError;

pub fn run_ls(session: &Session, as_json: bool) -> Result<(), CliError> {
    session.ensure_ready()?;
    let listing = listing(session.mode(), session.navigator());

    if as_json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        println!("{} ({})", listing.path, listing.mode);
        for line in format_listing_lines(&listing) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn run_pwd(session: &Session) -> Result<(), CliError> {
    session.ensure_ready()?;
    println!("{}", session.navigator().display_path());
    Ok(())
}
