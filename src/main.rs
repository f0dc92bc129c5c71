#![allow(clippy::multiple_crate_versions)]

use clap::{Arg, ArgAction, Command};

mod commands;
mod config;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .env("RELAY_CONFIG")
        .help("Path to the relay TOML configuration")
        .default_value("relay.toml");

    Command::new("relay")
        .version(VERSION)
        .about("Relay - webhook channel gateway")
        .subcommand(
            Command::new("serve")
                .about("Serve channel webhooks")
                .arg(config_arg.clone())
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .value_parser(clap::value_parser!(u16))
                        .help("Override the configured listen port"),
                ),
        )
        .subcommand(
            Command::new("send")
                .about("Send one message through a configured channel")
                .arg(config_arg)
                .arg(
                    Arg::new("channel")
                        .long("channel")
                        .value_name("UUID")
                        .required(true)
                        .help("Channel to send through"),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_name("ADDRESS")
                        .required(true)
                        .help("Recipient address, in the channel's first URN scheme"),
                )
                .arg(
                    Arg::new("text")
                        .long("text")
                        .value_name("TEXT")
                        .default_value("")
                        .help("Message text"),
                )
                .arg(
                    Arg::new("attachment")
                        .long("attachment")
                        .value_name("URL")
                        .action(ArgAction::Append)
                        .help("Attachment, may be repeated"),
                )
                .arg(
                    Arg::new("quick-reply")
                        .long("quick-reply")
                        .value_name("TEXT")
                        .action(ArgAction::Append)
                        .help("Quick reply option, may be repeated"),
                )
                .arg(
                    Arg::new("id")
                        .long("id")
                        .value_name("ID")
                        .value_parser(clap::value_parser!(i64))
                        .default_value("1")
                        .help("Message id reported to the bridge"),
                ),
        )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let matches = cli().get_matches();

    let result = match matches.subcommand() {
        Some(("serve", sub_matches)) => commands::serve::run(sub_matches).await,
        Some(("send", sub_matches)) => commands::send::run(sub_matches).await,
        _ => {
            println!("Relay v{}", VERSION);
            println!("Use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("relay: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn send_collects_repeated_flags() {
        let matches = cli()
            .try_get_matches_from([
                "relay",
                "send",
                "--channel",
                "8eb23e93-5ecb-45ba-b726-3b064e0c56ab",
                "--to",
                "+15551234567",
                "--quick-reply",
                "yes",
                "--quick-reply",
                "no",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let replies: Vec<&String> = sub.get_many::<String>("quick-reply").unwrap().collect();
        assert_eq!(replies, ["yes", "no"]);
        assert_eq!(sub.get_one::<i64>("id"), Some(&1));
    }
}
