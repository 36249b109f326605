use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tabletalk::config::{LogArgs, ModelArgs, StoreArgs};
use tabletalk::loader::DataSource;
use tabletalk::render::render_table;
use tabletalk::{logging, Pipeline, Session};

/// Ask questions about a CSV dataset in plain English.
#[derive(Parser, Debug)]
#[command(name = "tabletalk", version)]
struct Cli {
    /// CSV file to load into the table
    #[arg(long, conflicts_with = "url")]
    csv: Option<PathBuf>,

    /// CSV url to load into the table
    #[arg(long)]
    url: Option<String>,

    /// File to keep question history in between sessions
    #[arg(long, env = "TABLETALK_HISTORY")]
    history: Option<PathBuf>,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    log: LogArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(&cli.log)?;

    let store = cli.store.store();
    let source = match (&cli.csv, &cli.url) {
        (Some(path), _) => Some(DataSource::File(path.clone())),
        (None, Some(url)) => Some(DataSource::Url(url.clone())),
        (None, None) => None,
    };

    let session = match source {
        Some(source) => Session::load(store, &source, &cli.store.table)
            .wrap_err_with(|| format!("failed to load {source}"))?,
        None => Session::open(store, &cli.store.table).wrap_err_with(|| {
            format!(
                "no table {} in {}; pass --csv or --url to load one",
                cli.store.table,
                cli.store.db.display()
            )
        })?,
    };

    println!(
        "Table '{}' with columns: {}",
        session.table.name,
        session.table.columns.join(", ")
    );

    let mut pipeline = Pipeline::new(cli.model.generator()?, cli.model.policy());

    let mut editor = DefaultEditor::new()?;
    if let Some(history) = &cli.history {
        if let Err(e) = editor.load_history(history) {
            tracing::debug!(error = %e, path = %history.display(), "no history loaded");
        }
    }

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => break,
            Err(e) => return Err(e.into()),
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        editor.add_history_entry(question)?;

        match pipeline.answer(&session, question) {
            Ok(answer) => {
                println!("Generated SQL Query: {}", answer.sql);
                println!("Query Results:");
                println!("{}", render_table(&answer.result));
            }
            Err(e) => println!("Error executing query: {e}"),
        }
    }

    if let Some(history) = &cli.history {
        editor
            .save_history(history)
            .wrap_err_with(|| format!("failed to save history to {}", history.display()))?;
    }

    Ok(())
}
