use clap::{Parser, Subcommand};

mod cmd;
mod core;
mod tax;

/// Calculate UK Capital Gains Tax on share disposals
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cgtcalc")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full report: summary, per tax year calculations, transactions and asset events
    Report(cmd::report::ReportCommand),
    /// Per tax year totals as a table, JSON or CSV
    Summary(cmd::summary::SummaryCommand),
    /// Print the accepted input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Report(report) => report.exec(),
        Command::Summary(summary) => summary.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
