pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    load_urls_from_file, load_urls_from_source, open_database, parse_url_line, resolve_db_path,
    scan_config_from_args,
};
