use crate::commands::{run_batch, run_quote, BatchArgs, QuoteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use dynamic_pricing::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Dynamic Pricing",
    about = "Serve, quote and batch-price retail orders with contextual markups",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Price a single JSON record
    Quote(QuoteArgs),
    /// Price every row of a CSV file
    Batch(BatchArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Quote(args) => run_quote(args),
        Command::Batch(args) => run_batch(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn quote_accepts_inline_factors_and_hour() {
        let cli = Cli::try_parse_from([
            "dynamic-pricing-api",
            "quote",
            "--factors",
            r#"{"BaseSellingPrice": 10}"#,
            "--hour",
            "17",
            "--explain",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Quote(args)) => {
                assert_eq!(args.hour.map(|hour| hour.get()), Some(17));
                assert!(args.explain);
                assert!(args.input.is_none());
            }
            other => panic!("expected quote command, got {other:?}"),
        }
    }

    #[test]
    fn quote_requires_a_record_and_batch_checks_the_hour() {
        assert!(Cli::try_parse_from(["dynamic-pricing-api", "quote"]).is_err());
        assert!(Cli::try_parse_from([
            "dynamic-pricing-api",
            "batch",
            "--input",
            "rows.csv",
            "--hour",
            "31",
        ])
        .is_err());
    }
}
