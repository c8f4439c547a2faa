use crate::cli::{actions::Action, globals::Config};
use crate::peranto::new;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, config: Config) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            new(port, dsn, config).await?;
        }
    }

    Ok(())
}
