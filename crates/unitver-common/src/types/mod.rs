//! Shared value types

mod change_type;
mod semver;

pub use change_type::ChangeType;
pub use semver::SemanticVersion;
