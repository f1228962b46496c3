pub mod correlation;
pub mod hoda;
pub mod logging;
pub mod redis;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_RELAY_BASE_URL: &str = "relay-base-url";
pub const ARG_REDIRECT_ENCODING: &str = "redirect-encoding";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("hoda-relay")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("HODA_RELAY_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_RELAY_BASE_URL)
                .long(ARG_RELAY_BASE_URL)
                .help("Public base URL of this relay, used to build the provider callback URL")
                .long_help(
                    "Public base URL of this relay, example: https://relay.tld\n\nThe provider posts to `<base>/callback`. Defaults to http://localhost:<port>.",
                )
                .env("HODA_RELAY_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_REDIRECT_ENCODING)
                .long(ARG_REDIRECT_ENCODING)
                .help("Encoding of the callback redirect Location: component or none")
                .env("HODA_RELAY_REDIRECT_ENCODING")
                .default_value("component")
                .value_parser(clap::value_parser!(crate::api::RedirectEncoding)),
        );

    let command = hoda::with_args(command);
    let command = correlation::with_args(command);
    let command = redis::with_args(command);
    logging::with_args(command)
}
