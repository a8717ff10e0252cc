//! segdb CLI Client
//!
//! Command-line interface for interacting with a segdb server.

use clap::{Parser, Subcommand};
use segdb::Client;

/// segdb CLI
#[derive(Parser, Debug)]
#[command(name = "segdb-cli")]
#[command(about = "CLI for the segdb key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4321")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a database
    CreateDatabase {
        database: String,
    },

    /// Create a table in a database
    CreateTable {
        database: String,
        table: String,
    },

    /// Set a key-value pair, printing the previous value
    Set {
        database: String,
        table: String,
        key: String,
        value: String,
    },

    /// Get a value by key
    Get {
        database: String,
        table: String,
        key: String,
    },

    /// Delete a key, printing the value it had
    Del {
        database: String,
        table: String,
        key: String,
    },
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {}", e.chain());
            std::process::exit(1);
        }
    };

    let result = match &args.command {
        Commands::CreateDatabase { database } => client.create_database(database).map(Some),
        Commands::CreateTable { database, table } => {
            client.create_table(database, table).map(Some)
        }
        Commands::Set {
            database,
            table,
            key,
            value,
        } => client
            .set(database, table, key.as_bytes(), value.as_bytes())
            .map(render),
        Commands::Get {
            database,
            table,
            key,
        } => client.get(database, table, key.as_bytes()).map(render),
        Commands::Del {
            database,
            table,
            key,
        } => client.delete(database, table, key.as_bytes()).map(render),
    };

    match result {
        Ok(Some(output)) => println!("{}", output),
        Ok(None) => println!("(nil)"),
        Err(e) => {
            eprintln!("error: {}", e.chain());
            std::process::exit(1);
        }
    }
}

fn render(value: Option<Vec<u8>>) -> Option<String> {
    value.map(|v| String::from_utf8_lossy(&v).into_owned())
}
