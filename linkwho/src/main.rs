use colored::Colorize;
use linkwho::commands::command_argument_builder;
use linkwho::handlers::{handle_run, handle_users, init_tracing, print_banner};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    init_tracing(chosen_command.get_count("verbose"), quiet);

    let outcome = match chosen_command.subcommand() {
        Some(("run", primary_command)) => handle_run(primary_command, quiet).await,
        Some(("users", primary_command)) => handle_users(primary_command, quiet).await,
        // No subcommand provided, just show the banner
        None => return,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
