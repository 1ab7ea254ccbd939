use colored::Colorize;
use pageprobe::commands::command_argument_builder;
use pageprobe::handlers::{
    handle_add, handle_analyze, handle_delete, handle_init, handle_list, handle_run,
    handle_show, handle_stop, resolve_db_path,
};
use pageprobe_core::print_banner;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_logging(chosen_command.get_flag("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let db_path = chosen_command
        .get_one::<String>("db")
        .map(|raw| resolve_db_path(raw))
        .unwrap_or_else(|| resolve_db_path(pageprobe::commands::DEFAULT_DB_PATH));

    let outcome = match chosen_command.subcommand() {
        None => return,
        Some(("init", args)) => handle_init(args, &db_path),
        Some(("add", args)) => handle_add(args, &db_path),
        Some(("list", args)) => handle_list(args, &db_path),
        Some(("analyze", args)) => handle_analyze(args, &db_path, quiet).await,
        Some(("run", args)) => handle_run(args, &db_path, quiet).await,
        Some(("stop", args)) => handle_stop(args, &db_path),
        Some(("show", args)) => handle_show(args, &db_path),
        Some(("delete", args)) => handle_delete(args, &db_path),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
