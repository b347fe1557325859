use crate::cli::{
    actions::{Action, server::Args},
    commands::session,
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let session = session::Options::parse(matches).context("invalid session arguments")?;

    Ok(Action::Server(Args { port, session }))
}
