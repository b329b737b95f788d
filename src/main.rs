use anyhow::Result;
use clap::Parser;

use tomes::cli::commands::translate::{self, TranslateOptions};
use tomes::cli::commands::{hardware, languages, load_config, sessions};
use tomes::cli::{Args, Command};
use tomes::output::{self, OutputConfig};
use tomes::ui::Style;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    output::init(OutputConfig::from_flags(args.quiet, args.no_color));

    // A broken config file is reported by the command that needs it.
    let level = load_config(args.config.as_deref())
        .ok()
        .and_then(|c| c.logging.level);
    tomes::logging::init(level.as_deref());

    if let Err(e) = run(args).await {
        eprintln!("{} {e:#}", Style::error("Error:"));
        std::process::exit(exit_code(&e));
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.config;

    match args.command {
        Command::Translate {
            input,
            output,
            to,
            from,
            provider,
            model,
            session_id,
            no_strict,
        } => {
            translate::run_translate(TranslateOptions {
                config,
                input,
                output,
                to,
                from,
                provider,
                model,
                session_id,
                no_strict,
            })
            .await?;
        }
        Command::Hardware => hardware::print_hardware()?,
        Command::Models { lang, recommend } => hardware::print_models(&lang, recommend)?,
        Command::Languages => languages::print_languages(),
        Command::Sessions { limit, offset } => {
            sessions::list_sessions(config.as_deref(), limit, offset).await?;
        }
        Command::Session { id } => sessions::show_session(config.as_deref(), &id).await?,
        Command::Stats => sessions::print_stats(config.as_deref()).await?,
        Command::Cleanup { older_than_days } => {
            sessions::cleanup(config.as_deref(), older_than_days).await?;
        }
    }

    Ok(())
}

/// Maps the root cause to a sysexits code.
fn exit_code(err: &anyhow::Error) -> exitcode::ExitCode {
    use tomes::Error;

    match err.chain().find_map(|e| e.downcast_ref::<Error>()) {
        Some(Error::Config(_) | Error::NoModelFits { .. }) => exitcode::CONFIG,
        Some(Error::InvalidDocument(_)) => exitcode::DATAERR,
        Some(Error::SessionNotFound(_)) => exitcode::NOINPUT,
        Some(Error::Backend(_) | Error::RateLimited { .. }) => exitcode::UNAVAILABLE,
        Some(Error::Cancelled) => exitcode::TEMPFAIL,
        Some(e) if e.is_storage() => exitcode::IOERR,
        _ => exitcode::SOFTWARE,
    }
}
