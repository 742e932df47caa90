use clap::{Parser, Subcommand};
use expense_tracker::config::{Config, DEFAULT_DATABASE_PATH, DEFAULT_EXPORT_DIR, ExportConfig};
use expense_tracker::db::{connection, repository, summary};
use expense_tracker::models::transaction::{
    NewTransaction, Transaction, TransactionType, parse_date, start_of_day,
};
use expense_tracker::operations::export::{LogFileIndex, export_all};
use expense_tracker::operations::import::import_transactions_to_db;
use expense_tracker::operations::summary::{daily_summary, format_money};
use expense_tracker::{Error, Result};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Record income and expenses, see running totals and export them to CSV.
#[derive(Parser, Debug)]
#[command(name = "extrack", version, about, long_about = None)]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "EXTRACK_DB", default_value = DEFAULT_DATABASE_PATH)]
    db: PathBuf,

    /// Directory CSV exports are written to.
    #[arg(long, env = "EXTRACK_EXPORT_DIR", default_value = DEFAULT_EXPORT_DIR)]
    export_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a new transaction.
    Add(TransactionArgs),
    /// Replace the fields of an existing transaction.
    Update {
        id: i64,
        #[command(flatten)]
        fields: TransactionArgs,
    },
    /// Delete a transaction.
    Delete { id: i64 },
    /// Show one transaction.
    Show { id: i64 },
    /// List transactions, newest first.
    List {
        #[arg(long = "type", value_parser = parse_type_arg, conflicts_with_all = ["category", "from"])]
        kind: Option<TransactionType>,
        #[arg(long, conflicts_with = "from")]
        category: Option<String>,
        /// First day to include (YYYY-MM-DD or DD/MM/YYYY).
        #[arg(long, value_parser = parse_date_arg, requires = "to")]
        from: Option<chrono::NaiveDate>,
        /// Last day to include.
        #[arg(long, value_parser = parse_date_arg, requires = "from")]
        to: Option<chrono::NaiveDate>,
    },
    /// Find transactions whose category or note contains the text.
    Search { query: String },
    /// Show income, expense and balance totals.
    Totals,
    /// Show expense totals per category.
    Categories {
        #[arg(long)]
        category: Option<String>,
    },
    /// Print the daily balance summary.
    Summary,
    /// Export every transaction to a CSV file.
    Export,
    /// Import transactions from a CSV file in the export format.
    Import { path: PathBuf },
}

#[derive(clap::Args, Debug)]
struct TransactionArgs {
    /// income or expense
    #[arg(value_parser = parse_type_arg)]
    kind: TransactionType,
    #[arg(value_parser = parse_amount_arg, allow_negative_numbers = true)]
    amount: Decimal,
    category: String,
    #[arg(long, default_value = "")]
    note: String,
    /// Defaults to now when adding and to the stored date when updating.
    #[arg(long, value_parser = parse_date_arg)]
    date: Option<chrono::NaiveDate>,
}

impl TransactionArgs {
    fn into_new_transaction(self) -> NewTransaction {
        NewTransaction::new(
            self.amount,
            self.kind,
            self.category,
            self.note,
            self.date.map(start_of_day),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config {
        database_path: cli.db,
        export: ExportConfig {
            directory: cli.export_dir,
        },
    };

    let conn = connection::establish_connection(&config.database_path)?;
    let result = execute(&conn, &config, cli.command);
    connection::close_connection(conn)?;
    result
}

fn execute(conn: &Connection, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Add(fields) => {
            let id = repository::add_transaction(conn, &fields.into_new_transaction())?;
            println!("Transaction {} added successfully!", id);
        }
        Command::Update { id, fields } => {
            if repository::update_transaction(conn, id, &fields.into_new_transaction())? {
                println!("Transaction {} updated.", id);
            } else {
                println!("Transaction with ID {} not found.", id);
            }
        }
        Command::Delete { id } => {
            if repository::delete_transaction(conn, id)? {
                println!("Transaction {} removed successfully.", id);
            } else {
                println!("Transaction with ID {} not found.", id);
            }
        }
        Command::Show { id } => match repository::get_transaction(conn, id)? {
            Some(transaction) => print_transactions(&[transaction]),
            None => println!("Transaction with ID {} not found.", id),
        },
        Command::List {
            kind,
            category,
            from,
            to,
        } => {
            let transactions = match (kind, category, from, to) {
                (Some(kind), _, _, _) => repository::get_transactions_by_type(conn, kind)?,
                (_, Some(category), _, _) => repository::get_transactions_by_category(conn, &category)?,
                (_, _, Some(from), Some(to)) => repository::get_transactions_by_date_range(conn, from, to)?,
                _ => repository::get_all_transactions(conn)?,
            };
            print_transactions(&transactions);
        }
        Command::Search { query } => {
            let transactions = repository::search_transactions(conn, &query)?;
            if transactions.is_empty() {
                println!("No transactions found matching '{}'.", query);
            } else {
                print_transactions(&transactions);
            }
        }
        Command::Totals => {
            let totals = summary::totals(conn)?;
            println!("Income:  {}", format_money(totals.income));
            println!("Expense: {}", format_money(totals.expense));
            println!("Balance: {}", format_money(totals.balance));
        }
        Command::Categories { category } => match category {
            Some(category) => {
                let total = summary::total_expense_by_category(conn, &category)?;
                println!("{}: {}", category, format_money(total));
            }
            None => {
                for (category, total) in summary::expense_totals_by_category(conn)? {
                    println!("{:<20} {:>12}", category, format_money(total));
                }
            }
        },
        Command::Summary => println!("{}", daily_summary(conn)?),
        Command::Export => {
            let path = export_all(conn, &config.export, &LogFileIndex)?;
            println!("Exported transactions to {}", path.display());
        }
        Command::Import { path } => {
            let count = import_transactions_to_db(conn, &path)?;
            println!("Successfully imported {} transactions.", count);
        }
    }
    Ok(())
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions.");
        return;
    }
    for t in transactions {
        println!(
            "#{:<5} {} {:<8} {:<20} {:>12} {}",
            t.id,
            t.calendar_date().format("%Y-%m-%d"),
            t.kind,
            t.category,
            format_money(t.signed_amount()),
            t.note
        );
    }
}

fn parse_type_arg(input: &str) -> std::result::Result<TransactionType, String> {
    TransactionType::from_str(input).map_err(|e| e.to_string())
}

fn parse_amount_arg(input: &str) -> std::result::Result<Decimal, String> {
    Decimal::from_str(input.trim())
        .map_err(|_| Error::InvalidInput(format!("'{}' is not a valid amount", input)).to_string())
}

fn parse_date_arg(input: &str) -> std::result::Result<chrono::NaiveDate, String> {
    parse_date(input).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_negative_amount_and_date() {
        let cli = Cli::try_parse_from([
            "extrack", "--db", "t.db", "add", "expense", "-12.50", "Food", "--note", "Lunch", "--date", "03/01/2025",
        ])
        .unwrap();

        match cli.command {
            Command::Add(fields) => {
                let input = fields.into_new_transaction();
                assert_eq!(input.kind, TransactionType::Expense);
                assert_eq!(input.amount, Decimal::new(-1250, 2));
                assert_eq!(input.note, "Lunch");
                assert_eq!(
                    input.date.unwrap().date_naive(),
                    chrono::NaiveDate::from_ymd_opt(2025, 1, 3).unwrap()
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let result = Cli::try_parse_from(["extrack", "add", "transfer", "10", "Bank"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_range_requires_both_ends() {
        assert!(Cli::try_parse_from(["extrack", "list", "--from", "2025-01-01"]).is_err());
        assert!(Cli::try_parse_from(["extrack", "list", "--from", "2025-01-01", "--to", "2025-01-31"]).is_ok());
    }

    #[test]
    fn test_execute_against_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("tracker.db"),
            export: ExportConfig {
                directory: dir.path().join("exports"),
            },
        };
        let conn = connection::establish_connection(&config.database_path).unwrap();

        let add = Cli::try_parse_from(["extrack", "add", "income", "1000", "Salary"]).unwrap();
        execute(&conn, &config, add.command).unwrap();
        let add = Cli::try_parse_from(["extrack", "add", "expense", "250", "Food", "--note", "Lunch"]).unwrap();
        execute(&conn, &config, add.command).unwrap();

        assert_eq!(summary::total_balance(&conn).unwrap(), Decimal::new(750, 0));
        execute(&conn, &config, Command::Export).unwrap();
        assert_eq!(std::fs::read_dir(&config.export.directory).unwrap().count(), 1);
    }
}
