pub mod deploy;
pub mod rollback;
pub mod start_process;

pub use deploy::{DeployCommand, DeployError, DeployResponse};
pub use rollback::{RollbackCommand, RollbackError, RollbackOutcome, RollbackResponse};
pub use start_process::{StartProcessCommand, StartProcessError, StartProcessResponse};
