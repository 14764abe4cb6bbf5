//! etagkv CLI Client
//!
//! Command-line interface for interacting with etagkv.

use chrono::DateTime;
use clap::{Parser, Subcommand};
use etagkv::network::{Client, ClientError, Fetched};

/// etagkv CLI
#[derive(Parser, Debug)]
#[command(name = "etagkv-cli")]
#[command(about = "CLI for the etagkv versioned key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7379")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,

        /// Skip the value if this version is still current
        #[arg(long, default_value = "0")]
        if_none_match: u64,
    },

    /// Create or update a key
    Put {
        /// The key to write
        key: String,

        /// The value to write
        value: String,

        /// Version being replaced; 0 creates a new key
        #[arg(long, default_value = "0")]
        version: u64,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List keys starting with a prefix
    Find {
        /// Key prefix (empty lists everything)
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&mut client, args.command) {
        eprintln!("(error) {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn run(client: &mut Client, command: Commands) -> Result<(), ClientError> {
    match command {
        Commands::Get { key, if_none_match } => match client.get(&key, if_none_match)? {
            Fetched::Entry(record) => {
                println!("version: {}", record.version);
                println!("last-modified: {}", http_date(record.last_modified));
                println!("{}", String::from_utf8_lossy(&record.payload));
            }
            Fetched::NotModified {
                version,
                last_modified,
            } => {
                println!("(not modified)");
                println!("version: {}", version);
                println!("last-modified: {}", http_date(last_modified));
            }
        },
        Commands::Put {
            key,
            value,
            version,
        } => {
            let new_version = client.put(&key, value.as_bytes(), version)?;
            println!("version: {}", new_version);
        }
        Commands::Del { key } => {
            client.delete(&key)?;
            println!("OK");
        }
        Commands::Find { prefix } => {
            let keys = client.find(&prefix)?;
            if keys.is_empty() {
                println!("(empty)");
            }
            for (i, key) in keys.iter().enumerate() {
                println!("{}) {}", i + 1, key);
            }
        }
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
    }
    Ok(())
}

fn http_date(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos).to_rfc2822()
}

fn exit_code(err: &ClientError) -> i32 {
    match err {
        ClientError::NotFound | ClientError::Gone => 2,
        ClientError::Conflict(_) => 3,
        _ => 1,
    }
}
