//! `unitver deploy` command implementation

use colored::Colorize;
use unitver_common::{snapshot, ChangeType};

use crate::api::{types::DeployRequest, ApiClient};
use crate::error::{CliError, Result};

/// Deploy a snapshot file as the next version of `name`
pub async fn run(
    client: &ApiClient,
    name: &str,
    snapshot_file: &str,
    change_type: &str,
    change_log: Option<String>,
    published_by: Option<String>,
) -> Result<()> {
    let change_type: ChangeType = change_type.parse()?;

    let bytes = std::fs::read(snapshot_file).map_err(|e| {
        CliError::invalid_argument(format!("cannot read snapshot file '{}': {}", snapshot_file, e))
    })?;
    if bytes.is_empty() {
        return Err(CliError::invalid_argument(format!(
            "snapshot file '{}' is empty",
            snapshot_file
        )));
    }

    tracing::debug!(function_unit = name, bytes = bytes.len(), "Deploying snapshot");

    let request = DeployRequest {
        snapshot: snapshot::encode(&bytes),
        change_type: change_type.as_str().to_string(),
        change_log,
        published_by,
    };

    let result = client.deploy(name, &request).await?;

    println!(
        "{} Deployed {} {}",
        "✓".green(),
        result.function_unit_name.bold(),
        result.version.to_string().cyan()
    );
    println!("  Version ID:     {}", result.version_id);
    println!("  Process key:    {}", result.process_definition_key);
    println!("  Deployed at:    {}", result.deployed_at.to_rfc3339());

    Ok(())
}
