//! Command implementations

pub mod check;
pub mod deploy;
pub mod rollback;
pub mod units;
pub mod versions;

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

/// Table with the CLI's standard styling
pub(crate) fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}
