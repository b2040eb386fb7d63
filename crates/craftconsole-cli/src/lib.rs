use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "craftconsole", version, about = "Terminal client for WebConsole servers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file to use instead of the per-user one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open an interactive console on a configured server.
    Connect {
        server: String,
    },
    /// List configured servers.
    Servers,
    Config {
        #[arg(long)]
        init: bool,
    },
    /// Render a raw server log file the way the console shows it.
    Render {
        file: PathBuf,
        #[arg(long)]
        timestamps: bool,
        #[arg(long)]
        html: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connect_with_config_override() {
        let cli = Cli::parse_from(["craftconsole", "--config", "/tmp/c.toml", "connect", "lobby"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(cli.command, Some(Command::Connect { ref server }) if server == "lobby"));
    }

    #[test]
    fn parses_render_flags() {
        let cli = Cli::parse_from(["craftconsole", "render", "latest.log", "--timestamps"]);
        match cli.command {
            Some(Command::Render {
                file,
                timestamps,
                html,
            }) => {
                assert_eq!(file, PathBuf::from("latest.log"));
                assert!(timestamps);
                assert!(!html);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn verifies_command_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
