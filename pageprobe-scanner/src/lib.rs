pub mod analyzer;
pub mod config;
pub mod error;
pub mod fetch;
pub mod links;
pub mod login;
pub mod probe;
pub mod result;
pub mod scanner;

pub use config::ScanConfig;
pub use error::ScanError;
pub use result::{AnalysisResult, BrokenLink, HeadingCounts, MarkupVersion};
pub use scanner::Scanner;
pub use tokio_util::sync::CancellationToken;
