use std::path::Path;

use crate::commands::common::{find_folder, write_output, Session};
use crate::error::CliError;

pub async fn run_export(
    session: &mut Session,
    target: &str,
    output: Option<&Path>,
) -> Result<(), CliError> {
    session.ensure_ready()?;
    let id = find_folder(session.navigator(), target)?.id.clone();
    let archive = session.workspace().export_folder(&id).await?;

    for skipped in &archive.report.skipped {
        eprintln!("Skipped {}: {}", skipped.path, skipped.reason);
    }
    let path = write_output(output, &archive.file_name, &archive.bytes)?;
    println!(
        "{} ({} files, {} empty folders)",
        path.display(),
        archive.report.written,
        archive.report.directories
    );
    Ok(())
}
