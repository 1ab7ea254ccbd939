use clap::{Arg, arg, command};

pub const DEFAULT_DB_PATH: &str = "~/.config/pageprobe/pageprobe.db";

// Keep in sync with pageprobe_scanner::config defaults
const DEFAULT_FETCH_TIMEOUT: &str = "30";
const DEFAULT_PROBE_TIMEOUT: &str = "5";
const DEFAULT_PROBE_WORKERS: &str = "4";

fn scan_arguments() -> Vec<Arg> {
    vec![
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Page fetch timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value(DEFAULT_FETCH_TIMEOUT),
        arg!(--"probe-timeout" <SECONDS>)
            .required(false)
            .help("Per-link accessibility check timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value(DEFAULT_PROBE_TIMEOUT),
        arg!(--"probe-workers" <NUM_WORKERS>)
            .required(false)
            .help("How many link checks may run at once for a single page")
            .value_parser(clap::value_parser!(usize))
            .default_value(DEFAULT_PROBE_WORKERS),
    ]
}

fn report_arguments() -> Vec<Arg> {
    vec![
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json")
            .value_parser(["text", "json"])
            .default_value("text"),
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    ]
}

fn job_id_argument() -> Arg {
    arg!(<ID> "The job id").value_parser(clap::value_parser!(i64))
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("pageprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("pageprobe")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Show debug logging (overridden by RUST_LOG)")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"db" <PATH>)
                .required(false)
                .help("Location of the pageprobe database")
                .default_value(DEFAULT_DB_PATH)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the pageprobe database on your filesystem")
                .arg(
                    arg!(-f --"force")
                        .help("Deletes and recreates any existing database at the location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("add")
                .about("Queues one or more pages for analysis")
                .arg(
                    arg!([URL] ...)
                        .required(false)
                        .help("Page URLs to queue")
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of page URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("list")
                .about("Lists analysis jobs")
                .arg(
                    arg!(--"page" <N>)
                        .required(false)
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"page-size" <N>)
                        .required(false)
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"sort" <COLUMN>)
                        .required(false)
                        .value_parser(["id", "url", "status", "created_at"])
                        .default_value("id"),
                )
                .arg(
                    arg!(--"order" <ORDER>)
                        .required(false)
                        .value_parser(["asc", "desc"])
                        .default_value("desc"),
                ),
        )
        .subcommand(
            command!("analyze")
                .about("Queues a page, analyzes it right away and prints the report")
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("The page to analyze"),
                )
                .args(scan_arguments())
                .args(report_arguments()),
        )
        .subcommand(
            command!("run")
                .about("Runs (or reruns) queued jobs concurrently. Ctrl-C stops them.")
                .arg(
                    arg!(<ID> ... "Job ids to run")
                        .value_parser(clap::value_parser!(i64)),
                )
                .args(scan_arguments()),
        )
        .subcommand(
            command!("stop")
                .about("Puts a job back in the queue")
                .arg(job_id_argument()),
        )
        .subcommand(
            command!("show")
                .about("Shows the stored analysis for a job")
                .arg(job_id_argument())
                .args(report_arguments()),
        )
        .subcommand(
            command!("delete")
                .about("Deletes jobs and their results")
                .arg(
                    arg!(<ID> ... "Job ids to delete")
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
