//! `unitver units` command implementation

use colored::Colorize;

use crate::api::ApiClient;
use crate::commands::styled_table;
use crate::error::Result;

pub async fn run(client: &ApiClient) -> Result<()> {
    let list = client.list_function_units().await?;

    if list.function_units.is_empty() {
        println!("No function units found.");
        println!("Run 'unitver deploy' to publish the first version.");
        return Ok(());
    }

    let mut table = styled_table();
    table.set_header(vec!["Function unit", "Status", "Active version", "Versions", "Deployed"]);

    for unit in &list.function_units {
        table.add_row(vec![
            unit.function_unit_name.clone(),
            unit.status.clone(),
            unit.current_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            unit.version_count.to_string(),
            unit.deployed_at
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", table);
    println!("{}", format!("{} function unit(s)", list.total).dimmed());

    Ok(())
}
