//! Browser availability check.

use anyhow::Context;
use console::style;

use crate::browser::{find_chrome, ChromeLauncher, PageSource, SessionLauncher};
use crate::config::Settings;

/// Locate a browser binary (or remote endpoint) and start one session.
pub async fn cmd_check_browser(settings: &Settings) -> anyhow::Result<()> {
    let config = &settings.browser;

    match &config.remote_url {
        Some(url) => println!("  {} Remote browser: {}", style("→").cyan(), url),
        None => {
            let binary = find_chrome(config.chrome_path.as_deref())?;
            println!("  {} Browser binary: {}", style("✓").green(), binary.display());
        }
    }

    let launcher = ChromeLauncher::new(config.clone());
    let mut session = launcher
        .acquire()
        .await
        .context("Browser could not be started")?;
    let version = session.version().await;
    session.close().await;

    println!(
        "{} Browser started ({}, {} engine, {})",
        style("✓").green(),
        version?,
        config.engine,
        if config.headless { "headless" } else { "headed" }
    );

    Ok(())
}
