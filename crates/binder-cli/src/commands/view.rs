use std::path::Path;

use binder_core::models::ContentRef;

use crate::commands::common::{find_file, format_size, format_timestamp, write_output, Session};
use crate::error::CliError;

pub async fn run_cat(session: &mut Session, target: &str) -> Result<(), CliError> {
    session.ensure_ready()?;
    let id = find_file(session.navigator(), target)?.id.clone();
    let (file, content) = session.workspace().view_file(&id).await?;

    match content {
        ContentRef::Text(text) => println!("{text}"),
        ContentRef::Inline { bytes, mime_type } => {
            let size = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
            match String::from_utf8(bytes) {
                Ok(text) if mime_type.starts_with("text/") => println!("{text}"),
                _ => println!(
                    "{} is {mime_type} ({}); save it with `binder get`",
                    file.name,
                    format_size(size)
                ),
            }
        }
        ContentRef::SignedUrl { url, expires_at } => {
            println!("{url}");
            eprintln!("Link expires {}", format_timestamp(expires_at));
        }
    }

    Ok(())
}

pub async fn run_get(
    session: &mut Session,
    target: &str,
    output: Option<&Path>,
) -> Result<(), CliError> {
    session.ensure_ready()?;
    let id = find_file(session.navigator(), target)?.id.clone();
    let download = session.workspace().download_file(&id).await?;

    let path = write_output(output, &download.file_name, &download.bytes)?;
    println!("{}", path.display());
    Ok(())
}
