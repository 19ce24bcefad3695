//! askdb — ask your database in plain language
//!
//! # Usage
//!
//! ```bash
//! # Ask with the default model
//! askdb ask "Give me the full name of all the people hired before May 2022"
//!
//! # Pick a model, export the rows
//! askdb "total revenue per region" --model llama3.2 --output results.csv
//!
//! # Look at what the model will see
//! askdb schema
//! ```

use anyhow::{Context, Result};
use askdb::prelude::*;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Column the result view always treats as numeric.
const REVENUE_COLUMN: &str = "total_revenue";

#[derive(Parser)]
#[command(name = "askdb")]
#[command(version)]
#[command(about = "🤖 Natural language to SQL, run against PostgreSQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    askdb ask 'names of everyone hired before May 2022'
    askdb 'top 5 customers by revenue' --model Gemini --format json
    askdb schema --table employees
    askdb repl --model llama3.2")]
struct Cli {
    /// The question to ask (shorthand for `askdb ask`)
    question: Option<String>,

    #[command(flatten)]
    ask: AskArgs,

    /// Model label (see `askdb models`)
    #[arg(short, long, env = "ASKDB_MODEL", global = true)]
    model: Option<String>,

    /// Config file (defaults to ./askdb.toml, then the user config dir)
    #[arg(short, long, env = "ASKDB_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone)]
struct AskArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Also write the rows to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only generate the SQL, don't run it
    #[arg(short, long)]
    dry_run: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate SQL for a question and run it
    Ask {
        /// The question to ask
        question: String,

        #[command(flatten)]
        args: AskArgs,
    },
    /// Show the database schema
    Schema {
        /// Only show this table's columns
        #[arg(short, long)]
        table: Option<String>,
    },
    /// List the available models
    Models,
    /// Interactive mode
    Repl,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("askdb=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let mut app = AppContext::from_config(&config);

    match &cli.command {
        Some(Commands::Ask { question, args }) => {
            let label = pick_model(&app, cli.model.as_deref())?;
            ask(&mut app, &label, question, args, cli.verbose).await
        }
        Some(Commands::Schema { table }) => show_schema(&mut app, table.as_deref()).await,
        Some(Commands::Models) => {
            show_models(&app);
            Ok(())
        }
        Some(Commands::Repl) => run_repl(&mut app, cli.model.as_deref()).await,
        None => match &cli.question {
            Some(question) => {
                let label = pick_model(&app, cli.model.as_deref())?;
                ask(&mut app, &label, question, &cli.ask, cli.verbose).await
            }
            None => {
                println!("{}", "🤖 askdb — natural language to SQL".cyan().bold());
                println!();
                println!("Usage: askdb ask <QUESTION> [OPTIONS]");
                println!();
                println!("Try: askdb --help");
                Ok(())
            }
        },
    }
}

fn pick_model(app: &AppContext, requested: Option<&str>) -> Result<String> {
    let label = match requested {
        Some(label) => label,
        None => app
            .registry()
            .default_label()
            .context("no models are registered")?,
    };
    let generator = app.registry().get(label)?;
    tracing::debug!(label, backend = generator.backend(), model = generator.model(), "model selected");
    Ok(label.to_string())
}

async fn ask(
    app: &mut AppContext,
    label: &str,
    question: &str,
    args: &AskArgs,
    verbose: bool,
) -> Result<()> {
    if verbose {
        println!("{} {}", "Question:".dimmed(), question.yellow());
        println!("{} {}", "Model:".dimmed(), label.cyan());
    }

    let sql = app.generate(label, question).await?;
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", sql.white());
    println!();

    if args.dry_run {
        return Ok(());
    }

    let mut rows = app.executor_mut().execute_query(&sql).await.into_result()?;
    rows.coerce_numeric(REVENUE_COLUMN);

    format_output(&rows, args.format)?;
    if let Some(path) = &args.output {
        write_csv(&rows, path)?;
    }
    Ok(())
}

fn format_output(rows: &ResultSet, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows.to_maps())?);
        }
        OutputFormat::Csv => {
            print!("{}", rows.to_csv()?);
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "(no results)".dimmed());
                return Ok(());
            }
            println!("{}", result_table(rows));
            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
    Ok(())
}

fn result_table(rows: &ResultSet) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(&rows.columns);
    for row in &rows.rows {
        table.add_row(row.iter().map(askdb::result::cell_text));
    }
    table
}

fn write_csv(rows: &ResultSet, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    rows.write_csv(file)?;
    println!("{} Wrote {} row(s) to {}", "✓".green(), rows.len(), path.display().to_string().cyan());
    Ok(())
}

async fn show_schema(app: &mut AppContext, table: Option<&str>) -> Result<()> {
    let info = app.schema().await.into_result()?;
    let schema = &info.descriptor;

    println!(
        "📊 {} tables, {} total columns",
        schema.table_count().to_string().cyan(),
        schema.column_count().to_string().cyan()
    );

    match table {
        None => println!("{}", schema.to_tree()),
        Some(name) => {
            let columns = schema.columns_of(name);
            if columns.is_empty() {
                anyhow::bail!("no table named '{}' in the public schema", name);
            }
            let mut out = Table::new();
            out.load_preset(UTF8_FULL)
                .set_header(vec!["Column Name", "Data Type"]);
            for col in columns {
                out.add_row(vec![col.column_name.as_str(), col.data_type.as_str()]);
            }
            println!("{out}");
        }
    }
    Ok(())
}

fn show_models(app: &AppContext) {
    println!("{}", "🤖 Available models".cyan().bold());
    println!();
    let default = app.registry().default_label();
    for (label, generator) in app.registry().iter() {
        let marker = if Some(label) == default { "*" } else { " " };
        println!(
            "{} {:12} {:8} {}",
            marker.green(),
            label.white().bold(),
            generator.backend().yellow(),
            generator.model().dimmed()
        );
    }
}

async fn run_repl(app: &mut AppContext, model: Option<&str>) -> Result<()> {
    use rustyline::DefaultEditor;
    use rustyline::error::ReadlineError;

    let mut label = pick_model(app, model)?;

    println!("{}", "🤖 askdb — Interactive Mode".cyan().bold());
    println!("{}", "Type a question to query the database. Commands:".dimmed());
    show_repl_help();

    let mut rl = DefaultEditor::new().context("initializing line editor")?;
    let history_path = dirs::home_dir()
        .map(|p| p.join(".askdb_history"))
        .unwrap_or_default();
    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("{}> ", label).cyan().bold().to_string();
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line.split_once(' ').unwrap_or((line, "")) {
                    (".exit" | ".quit" | "exit" | "quit", _) => {
                        println!("{}", "Goodbye! 👋".green());
                        break;
                    }
                    (".help" | "help", _) => show_repl_help(),
                    (".models", _) => show_models(app),
                    (".schema", rest) => {
                        let table = Some(rest.trim()).filter(|t| !t.is_empty());
                        if let Err(e) = show_schema(app, table).await {
                            eprintln!("{} {:#}", "✗".red(), e);
                        }
                    }
                    (".model", rest) => match pick_model(app, Some(rest.trim())) {
                        Ok(next) => {
                            label = next;
                            println!("{} using {}", "✓".green(), label.cyan());
                        }
                        Err(e) => eprintln!("{} {}", "✗".red(), e.to_string().red()),
                    },
                    _ => {
                        if let Err(e) = repl_ask(app, &label, line).await {
                            eprintln!("{} {}", "✗".red(), e.to_string().red());
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye! 👋".green());
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

async fn repl_ask(app: &mut AppContext, label: &str, question: &str) -> Result<()> {
    let answer = app.ask(label, question).await?;
    println!("{} {}", "→".green(), answer.sql.white().bold());

    match answer.outcome {
        Outcome::Success(mut rows) => {
            rows.coerce_numeric(REVENUE_COLUMN);
            format_output(&rows, OutputFormat::Table)?;
        }
        Outcome::Failed(e) => eprintln!("{} {}", "✗".red(), e.to_string().red()),
    }
    println!();
    Ok(())
}

fn show_repl_help() {
    println!("  {}            - Exit", ".exit".yellow());
    println!("  {}            - Show this help", ".help".yellow());
    println!("  {}          - List models", ".models".yellow());
    println!("  {}   - Switch model", ".model <label>".yellow());
    println!("  {} - Show schema", ".schema [table]".yellow());
    println!();
}
