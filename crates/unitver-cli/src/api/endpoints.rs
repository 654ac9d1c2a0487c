//! API endpoint URL builders

const FUNCTION_UNITS: &str = "api/v1/function-units";

fn unit_url(base_url: &str, name: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), FUNCTION_UNITS, name)
}

pub fn function_units_url(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), FUNCTION_UNITS)
}

pub fn deploy_url(base_url: &str, name: &str) -> String {
    format!("{}/deploy", unit_url(base_url, name))
}

pub fn versions_url(base_url: &str, name: &str) -> String {
    format!("{}/versions", unit_url(base_url, name))
}

pub fn active_version_url(base_url: &str, name: &str) -> String {
    format!("{}/versions/active", unit_url(base_url, name))
}

pub fn snapshot_url(base_url: &str, name: &str, version: &str) -> String {
    format!("{}/versions/{}/snapshot", unit_url(base_url, name), version)
}

pub fn rollback_plan_url(base_url: &str, name: &str, target: &str) -> String {
    format!("{}/rollback/plan?target_version={}", unit_url(base_url, name), target)
}

pub fn rollback_url(base_url: &str, name: &str) -> String {
    format!("{}/rollback", unit_url(base_url, name))
}

/// Invariant report for one unit, or for all units when `name` is `None`
pub fn invariants_url(base_url: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{}/invariants", unit_url(base_url, name)),
        None => format!("{}/invariants", function_units_url(base_url)),
    }
}

pub fn health_url(base_url: &str) -> String {
    format!("{}/health", base_url.trim_end_matches('/'))
}
