use crate::commands::common::{find_file, report, resolve_entry, resolve_text, Session};
use crate::error::CliError;

pub async fn run_edit(
    session: &mut Session,
    target: &str,
    text: &[String],
) -> Result<(), CliError> {
    session.ensure_ready()?;
    let id = find_file(session.navigator(), target)?.id.clone();
    let text = resolve_text(text)?.ok_or(CliError::EmptyContent)?;

    let notice = session.workspace().update_note(&id, &text).await;
    report(notice)
}

pub async fn run_rename(session: &mut Session, target: &str, name: &str) -> Result<(), CliError> {
    session.ensure_ready()?;
    let (kind, id) = {
        let entry = resolve_entry(session.navigator(), target)?;
        (entry.kind(), entry.id().clone())
    };

    let notice = session.workspace().rename(kind, &id, name).await;
    report(notice)
}
