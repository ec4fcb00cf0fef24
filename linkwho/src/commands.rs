use clap::{Arg, arg, command};
use linkwho_scanner::client::{DEFAULT_API_TEMPLATE, DEFAULT_ARTICLE_TEMPLATE, DEFAULT_USER_AGENT};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

// Flags shared by every subcommand that talks to the API
fn api_arguments() -> Vec<Arg> {
    vec![
        arg!(-o --"output-dir" <DIR>)
            .required(false)
            .help("Directory the output files are written to")
            .default_value("results"),
        arg!(-t --"threads" <NUM_WORKERS>)
            .required(false)
            .help("The number of async workers in each phase's pool.")
            .value_parser(clap::value_parser!(usize))
            .default_value("5"),
        arg!(--"delay-ms" <MILLIS>)
            .required(false)
            .help("Pause between consecutive page requests of one paginated query")
            .value_parser(clap::value_parser!(u64))
            .default_value("1000"),
        arg!(--"contrib-limit" <NUM>)
            .required(false)
            .help("Maximum number of contributions fetched per editor")
            .value_parser(clap::value_parser!(usize))
            .default_value("10"),
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("30"),
        arg!(--"api-url" <TEMPLATE>)
            .required(false)
            .help("API endpoint template; {site} is replaced by the site code")
            .default_value(DEFAULT_API_TEMPLATE),
        arg!(--"article-url" <TEMPLATE>)
            .required(false)
            .help("Page link template; {site} and {title} are substituted")
            .default_value(DEFAULT_ARTICLE_TEMPLATE),
        arg!(--"user-agent" <AGENT>)
            .required(false)
            .help("User-Agent header sent with every request")
            .default_value(DEFAULT_USER_AGENT),
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Summary format: text, json")
            .value_parser(["text", "json"])
            .default_value("text"),
    ]
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("linkwho")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("linkwho")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner, progress bars and non-essential output").required(false))
        .arg(arg!(-v --"verbose" ... "Increase log verbosity (-v debug, -vv trace)").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("run")
                .about(
                    "Find every usage of the given domains on the given wiki sites, attribute each \
                to the editor who introduced it, then fetch those editors' metadata.",
                )
                .arg(
                    arg!(-s --"sites" <PATH>)
                        .required(true)
                        .help("CSV file with a 'Language Code' column listing the sites to crawl"),
                )
                .arg(
                    arg!(-d --"domains" <PATH>)
                        .required(true)
                        .help("Newline-delimited file of domains to search for"),
                )
                .arg(
                    arg!(--"cache-capacity" <ENTRIES>)
                        .required(false)
                        .help("Number of page histories remembered by the introduction cache")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10000"),
                )
                .args(api_arguments()),
        )
        .subcommand(
            command!("users")
                .about("Fetch profiles and contributions for the editors listed in a pairs file")
                .arg(
                    arg!(-p --"pairs" <PATH>)
                        .required(true)
                        .help("File of 'site,editor' lines, as written by a previous run"),
                )
                .args(api_arguments()),
        )
}
