pub mod apply;
pub mod catalog;
pub mod config;
pub mod project;

use anyhow::Result;
use azdokit::Client;

use crate::Context;

/// Connect to the configured organization
pub fn client(ctx: &Context) -> Result<Client> {
    let connection = ctx
        .config
        .connection(ctx.org_url.as_deref(), ctx.token.as_deref())?;
    let options = ctx.config.polling.reconcile_options()?;
    Ok(Client::connect(&connection).with_options(options))
}
