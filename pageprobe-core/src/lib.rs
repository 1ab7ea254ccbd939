pub mod analysis;
pub mod data;
pub mod error;
pub mod report;
pub mod store;

pub use analysis::{JobOutcome, JobRunner, complete, finalize, run_analysis};
pub use data::{Database, Job, JobStatus, StoredResult};
pub use error::PersistenceError;
pub use store::ResultStore;

pub fn print_banner() {
    println!(
        r#"
  ___                 ___          _
 | _ \__ _ __ _ ___  | _ \_ _ ___ | |__  ___
 |  _/ _` / _` / -_) |  _/ '_/ _ \| '_ \/ -_)
 |_| \__,_\__, \___| |_| |_| \___/|_.__/\___|
          |___/            v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
