//! `unitver plan` and `unitver rollback`
//!
//! A rollback always fetches and prints the plan first. Nothing destructive
//! is sent unless the plan can proceed and the user confirms (or passed
//! `--yes`).

use colored::Colorize;
use inquire::Confirm;
use unitver_common::SemanticVersion;

use crate::api::{types::RollbackImpact, ApiClient};
use crate::error::{CliError, Result};

pub async fn plan(client: &ApiClient, name: &str, target: &str) -> Result<()> {
    let target = SemanticVersion::parse(target)?;
    let impact = client.plan_rollback(name, &target.to_string()).await?;
    print_impact(&impact);
    Ok(())
}

pub async fn run(client: &ApiClient, name: &str, target: &str, yes: bool) -> Result<()> {
    let target = SemanticVersion::parse(target)?;
    let target = target.to_string();

    let impact = client.plan_rollback(name, &target).await?;
    print_impact(&impact);

    if !impact.can_proceed {
        return Err(CliError::api(
            "VALIDATION_ERROR",
            impact
                .error_message
                .unwrap_or_else(|| format!("Cannot roll back to {}", target)),
        ));
    }

    if !yes {
        let confirmed = Confirm::new(&format!("Roll back {} to {}?", name, target))
            .with_default(false)
            .with_help_message("Deleted versions and process instances cannot be restored")
            .prompt()?;

        if !confirmed {
            println!("Rollback cancelled.");
            return Ok(());
        }
    }

    let result = client.rollback(name, &target).await?;

    println!();
    println!(
        "{} Rolled back {} to {}",
        "✓".green(),
        result.function_unit_name.bold(),
        result.rolled_back_to_version.to_string().cyan()
    );
    println!("  Deleted versions:          {}", join_versions(&result.deleted_versions));
    println!("  Deleted process instances: {}", result.deleted_process_count);

    Ok(())
}

fn print_impact(impact: &RollbackImpact) {
    println!(
        "{}",
        format!(
            "Rollback plan: {} -> {}",
            impact.function_unit_name, impact.target_version
        )
        .cyan()
        .bold()
    );

    if !impact.can_proceed {
        if let Some(message) = &impact.error_message {
            println!("  {} {}", "✗".red(), message);
        }
        return;
    }

    println!("  Versions to delete:          {}", join_versions(&impact.versions_to_delete));
    println!(
        "  Process instances to delete: {}",
        impact.total_process_instances_to_delete
    );
    if let Some(warning) = &impact.warning_message {
        println!();
        println!("{}", warning.yellow());
    }
}

fn join_versions(versions: &[SemanticVersion]) -> String {
    if versions.is_empty() {
        return "none".to_string();
    }
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
