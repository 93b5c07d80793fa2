use std::path::PathBuf;

use binder_core::workspace::UploadRequest;

use crate::commands::common::{guess_mime_type, print_warning, report, resolve_text, Session};
use crate::error::CliError;

pub async fn run_mkdir(session: &mut Session, name: &str) -> Result<(), CliError> {
    session.ensure_ready()?;
    let folder = session.workspace().create_folder(name).await?;
    println!("{}", folder.id);
    Ok(())
}

pub async fn run_note(session: &mut Session, name: &str, text: &[String]) -> Result<(), CliError> {
    session.ensure_ready()?;
    let text = resolve_text(text)?.unwrap_or_default();
    let note = session.workspace().create_note(name, &text).await?;
    println!("{}", note.id);
    Ok(())
}

pub async fn run_upload(session: &mut Session, paths: &[PathBuf]) -> Result<(), CliError> {
    session.ensure_ready()?;

    let mut requests = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        requests.push(UploadRequest {
            name,
            bytes: std::fs::read(path)?,
            mime_type: guess_mime_type(path),
        });
    }

    let batch = session.workspace().upload_batch(requests).await;
    for file in &batch.uploaded {
        println!("{}  {}", file.id, file.name);
    }
    for (_, notice) in &batch.failed {
        print_warning(notice);
    }

    if batch.failed.is_empty() {
        report(batch.notice)
    } else {
        Err(CliError::Notice(batch.notice))
    }
}
