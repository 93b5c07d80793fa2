use crate::commands::common::{report, resolve_entry, Session};
use crate::error::CliError;

pub async fn run_rm(session: &mut Session, target: &str) -> Result<(), CliError> {
    session.ensure_ready()?;
    let (kind, id) = {
        let entry = resolve_entry(session.navigator(), target)?;
        (entry.kind(), entry.id().clone())
    };

    let notice = session.workspace().delete(kind, &id).await;
    report(notice)
}
