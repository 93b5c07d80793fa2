use crate::cli::ModeArg;
use crate::commands::common::{report, Session};
use crate::error::CliError;

pub async fn run_mode(session: &mut Session, mode: Option<ModeArg>) -> Result<(), CliError> {
    let Some(mode) = mode else {
        let selector = session.workspace().selector();
        let origin = if selector.explicit_mode().is_some() {
            "chosen"
        } else {
            "automatic"
        };
        println!("{} ({origin})", selector.mode());
        return Ok(());
    };

    let notice = session.workspace().choose_mode(mode.into()).await;
    report(notice)?;
    session.reload().await
}
