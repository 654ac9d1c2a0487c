//! `unitver check` command implementation

use colored::Colorize;

use crate::api::ApiClient;
use crate::error::{CliError, Result};

/// Print the invariant report; fails when any unit is unhealthy
pub async fn run(client: &ApiClient, name: Option<&str>) -> Result<()> {
    let reports = client.check_invariants(name).await?;

    if reports.is_empty() {
        println!("No function units to check.");
        return Ok(());
    }

    let mut unhealthy = 0;
    for report in &reports {
        if report.healthy {
            println!("{} {}", "✓".green(), report.function_unit_name);
            continue;
        }

        unhealthy += 1;
        println!("{} {}", "✗".red(), report.function_unit_name.bold());
        for violation in &report.violations {
            println!("    {} {}", violation.code.yellow(), violation.message);
        }
    }

    if unhealthy > 0 {
        return Err(CliError::api(
            "INVARIANT_VIOLATION",
            format!("{} of {} function unit(s) violate invariants", unhealthy, reports.len()),
        ));
    }

    Ok(())
}
