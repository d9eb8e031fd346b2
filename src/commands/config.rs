use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::AzdoConfig;
use crate::state::AzdoState;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Path => path(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    ui::header("Configuration");

    let path = AzdoConfig::path(ctx.config_path.as_deref())?;
    let found = if path.exists() { "" } else { " (not found)" };
    ui::kv("Config file", &format!("{}{found}", path.display()));
    ui::kv("State file", &AzdoState::state_file()?.display().to_string());
    println!();

    let config = &ctx.config;
    ui::kv(
        "Organization URL",
        config.org_url(ctx.org_url.as_deref()).unwrap_or("(not set)"),
    );
    ui::kv(
        "Access token",
        &config
            .token(ctx.token.as_deref())
            .map_or_else(|| "(not set)".to_string(), ui::mask),
    );

    let polling = &config.polling;
    println!();
    ui::info("polling");
    ui::kv("create timeout", &ui::format_secs(polling.create_timeout_secs));
    ui::kv("update timeout", &ui::format_secs(polling.update_timeout_secs));
    ui::kv("delete timeout", &ui::format_secs(polling.delete_timeout_secs));
    ui::kv("poll interval", &ui::format_secs(polling.poll_interval_secs));
    ui::kv("await delete", &polling.await_delete.to_string());

    println!();
    ui::dim("Flags override AZDO_ORG_SERVICE_URL / AZDO_PERSONAL_ACCESS_TOKEN, which override the file.");
    Ok(())
}

fn path(ctx: &Context) -> Result<()> {
    println!("{}", AzdoConfig::path(ctx.config_path.as_deref())?.display());
    Ok(())
}
