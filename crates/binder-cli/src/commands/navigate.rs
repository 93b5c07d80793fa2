use crate::commands::common::{find_folder, Session};
use crate::error::CliError;

/// Walk `target` one segment at a time: `/` starts at the root, `..` goes up
/// and anything else names a folder in the current listing.
pub async fn run_cd(session: &mut Session, target: &str) -> Result<(), CliError> {
    session.ensure_ready()?;
    let target = target.trim();

    if target.starts_with('/') {
        session.workspace().go_to_root().await?;
    }
    for segment in target
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
    {
        if segment == ".." {
            session.workspace().up().await?;
        } else {
            let id = find_folder(session.navigator(), segment)?.id.clone();
            session.workspace().enter(id).await?;
        }
    }

    println!("{}", session.navigator().display_path());
    Ok(())
}
