use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tomes")]
#[command(about = "Resource-aware translation of long documents with local or remote LLMs")]
#[command(version)]
pub struct Args {
    /// Suppress progress and status output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file (defaults to ~/.config/tomes/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Translate a document (JSON document tree)
    Translate {
        /// Input document
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Target language code (ISO 639-1, e.g., sr, ru, de)
        #[arg(short = 't', long = "to")]
        to: Option<String>,

        /// Source language code (detected when omitted)
        #[arg(short = 'f', long = "from")]
        from: Option<String>,

        /// Provider name from config
        #[arg(short = 'p', long)]
        provider: Option<String>,

        /// Model name (chosen from detected hardware when omitted)
        #[arg(short = 'm', long)]
        model: Option<String>,

        /// Session id (a new one is generated when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// Keep going when the book title fails to translate
        #[arg(long)]
        no_strict: bool,
    },
    /// Show detected hardware capabilities
    Hardware,
    /// List catalog models
    Models {
        /// Only models supporting these language codes
        #[arg(short = 'l', long = "lang")]
        lang: Vec<String>,

        /// Show recommendations for this machine
        #[arg(long)]
        recommend: bool,
    },
    /// List supported language codes
    Languages,
    /// List translation sessions, newest first
    Sessions {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one translation session
    Session {
        /// Session id
        id: String,
    },
    /// Show storage statistics
    Stats,
    /// Remove cached translations not used recently
    Cleanup {
        /// Remove entries not accessed for this many days
        #[arg(long, value_name = "DAYS")]
        older_than_days: u64,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_translate() {
        let args = Args::try_parse_from([
            "tomes", "translate", "book.json", "-o", "out.json", "--to", "sr", "--no-strict",
        ])
        .unwrap();

        let Command::Translate {
            input,
            output,
            to,
            no_strict,
            from,
            ..
        } = args.command
        else {
            panic!("expected translate");
        };
        assert_eq!(input, PathBuf::from("book.json"));
        assert_eq!(output, Some(PathBuf::from("out.json")));
        assert_eq!(to.as_deref(), Some("sr"));
        assert_eq!(from, None);
        assert!(no_strict);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["tomes", "stats", "--quiet"]).unwrap();
        assert!(args.quiet);
        assert!(matches!(args.command, Command::Stats));
    }

    #[test]
    fn test_cleanup_requires_days() {
        assert!(Args::try_parse_from(["tomes", "cleanup"]).is_err());
        let args = Args::try_parse_from(["tomes", "cleanup", "--older-than-days", "30"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Cleanup {
                older_than_days: 30
            }
        ));
    }
}
