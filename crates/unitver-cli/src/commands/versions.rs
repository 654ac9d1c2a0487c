//! `unitver history`, `unitver active` and `unitver export`

use colored::Colorize;
use unitver_common::{snapshot, SemanticVersion};

use crate::api::ApiClient;
use crate::commands::styled_table;
use crate::error::Result;
use crate::OutputFormat;

/// Print every version of `name`, newest first
pub async fn history(client: &ApiClient, name: &str, format: OutputFormat) -> Result<()> {
    let history = client.version_history(name).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.versions.is_empty() {
        println!("No versions deployed for '{}'.", name);
        return Ok(());
    }

    let mut table = styled_table();
    table.set_header(vec![
        "Version",
        "Active",
        "Deployed",
        "Published by",
        "Instances",
        "Change log",
    ]);

    for entry in &history.versions {
        table.add_row(vec![
            entry.version.to_string(),
            if entry.is_active { "●".to_string() } else { String::new() },
            entry.deployed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.published_by.clone(),
            entry.process_instance_count.to_string(),
            entry.change_log.clone().unwrap_or_default(),
        ]);
    }

    println!("{}", format!("Versions of {}", history.function_unit_name).cyan().bold());
    println!("{}", table);

    Ok(())
}

pub async fn active(client: &ApiClient, name: &str) -> Result<()> {
    let active = client.active_version(name).await?;

    println!(
        "{} {}",
        active.function_unit_name.bold(),
        active.version.to_string().green()
    );
    println!("  Version ID:     {}", active.version_id);
    println!("  Process key:    {}", active.process_definition_key);
    println!("  Published by:   {}", active.published_by);
    println!("  Deployed at:    {}", active.deployed_at.to_rfc3339());
    if let Some(change_log) = &active.change_log {
        println!("  Change log:     {}", change_log);
    }

    Ok(())
}

/// Write the stored snapshot of `version` to `output`, byte for byte
pub async fn export(client: &ApiClient, name: &str, version: &str, output: &str) -> Result<()> {
    let version = SemanticVersion::parse(version)?;

    let export = client.export_snapshot(name, &version.to_string()).await?;
    let bytes = snapshot::decode(&export.snapshot)?;
    std::fs::write(output, &bytes)?;

    println!(
        "{} Exported {} {} ({} bytes) to {}",
        "✓".green(),
        export.function_unit_name.bold(),
        export.version.to_string().cyan(),
        export.size_bytes,
        output
    );

    Ok(())
}
