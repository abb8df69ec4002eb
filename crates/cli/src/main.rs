use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod publish;
mod serve;
mod subscribe;

#[derive(Parser, Debug)]
#[clap(author, version, about = "eventstream - publish/subscribe stream broker", long_about = None)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Start the broker
    Serve(serve::ServeCommand),
    /// Publish messages to a stream
    Publish(publish::PublishCommand),
    /// Subscribe to streams and print every delivered message
    Subscribe(subscribe::SubscribeCommand),
}

#[tokio::main]
async fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            process::exit(e.exit_code());
        }
    };

    init_tracing();

    if let Err(e) = handle_command(opts).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_command(opts: Opts) -> anyhow::Result<()> {
    match opts.command {
        Command::Serve(cmd) => cmd.execute().await,
        Command::Publish(cmd) => cmd.execute().await,
        Command::Subscribe(cmd) => cmd.execute().await,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_serve_defaults() {
        let opts = Opts::try_parse_from(["eventstream", "serve"]).unwrap();
        let Command::Serve(cmd) = opts.command else {
            panic!("expected serve");
        };
        let options = cmd.options();
        assert_eq!(options.addr(), "127.0.0.1:8080");
        assert_eq!(
            options.store_path,
            Some(PathBuf::from(eventstream::types::DEFAULT_STORE_FILE))
        );
    }

    #[test]
    fn test_serve_in_memory() {
        let opts =
            Opts::try_parse_from(["eventstream", "serve", "--port", "9000", "--in-memory"]).unwrap();
        let Command::Serve(cmd) = opts.command else {
            panic!("expected serve");
        };
        let options = cmd.options();
        assert_eq!(options.port, 9000);
        assert_eq!(options.store_path, None);
    }

    #[test]
    fn test_publish_requires_a_message() {
        assert!(Opts::try_parse_from(["eventstream", "publish", "--stream", "s"]).is_err());

        let opts =
            Opts::try_parse_from(["eventstream", "publish", "-s", "s", "one", "two"]).unwrap();
        let Command::Publish(cmd) = opts.command else {
            panic!("expected publish");
        };
        assert_eq!(cmd.messages, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_subscribe_after_requires_after_id() {
        assert!(
            Opts::try_parse_from(["eventstream", "subscribe", "-s", "s", "--mode", "after"])
                .is_err()
        );

        let opts = Opts::try_parse_from([
            "eventstream",
            "subscribe",
            "-s",
            "s1",
            "-s",
            "s2",
            "--mode",
            "after",
            "--after-id",
            "5",
        ])
        .unwrap();
        let Command::Subscribe(cmd) = opts.command else {
            panic!("expected subscribe");
        };
        assert_eq!(cmd.streams, vec!["s1".to_string(), "s2".to_string()]);
        assert_eq!(cmd.after_id, Some(5));
    }
}
