//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `run`     | `Run`            |
//! | `destroy` | `Destroy`        |
//! | `config`  | `Config`         |
//! | `report`  | `Report`         |

pub mod config;
pub mod destroy;
pub mod report;
pub mod run;

pub use config::cmd_config;
pub use destroy::cmd_destroy;
pub use report::cmd_report;
pub use run::cmd_run;
