//! kvgate CLI Client
//!
//! Talks to the storage engine directly, bypassing HTTP. Handy for
//! inspecting the space the gateway serves.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kvgate::service::{parse_value, validate_key};
use kvgate::{Config, InvalidInput, KvRepository, Record};

/// kvgate CLI
#[derive(Parser, Debug)]
#[command(name = "kvgate-cli")]
#[command(about = "CLI for the kvgate storage space")]
#[command(version)]
struct Args {
    /// Storage engine address
    #[arg(short, long, env = "KVGATE_STORAGE_ADDR", default_value = "127.0.0.1:3301")]
    storage: String,

    /// Engine user; empty connects as guest
    #[arg(short, long, env = "KVGATE_USER", default_value = "")]
    user: String,

    /// Engine password
    #[arg(short, long, env = "KVGATE_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Space holding `[key, value]` tuples
    #[arg(long, env = "KVGATE_SPACE", default_value = kvgate::repository::DEFAULT_SPACE)]
    space: String,

    /// Connect and request timeout in milliseconds
    #[arg(short, long, default_value = "1000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Store a new key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Replace the value of an existing key
    Update {
        /// The key to update
        key: String,

        /// The new value
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Ping the engine
    Ping,
}

fn stored(value: &str) -> &[u8] {
    parse_value(value).map_or(value.as_bytes(), |raw| raw.get().as_bytes())
}

fn print_record(record: &Record) {
    println!("{} = {}", record.key, String::from_utf8_lossy(&record.value));
}

/// Reject input the HTTP front end would reject, before touching storage
fn check_input(command: &Commands) -> Result<(), InvalidInput> {
    match command {
        Commands::Get { key } | Commands::Del { key } => validate_key(key),
        Commands::Set { key, value } | Commands::Update { key, value } => {
            validate_key(key)?;
            parse_value(value).map(|_| ())
        }
        Commands::Ping => Ok(()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = check_input(&args.command) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let timeout = Duration::from_millis(args.timeout_ms.max(1));
    let config = Config::builder()
        .storage_addr(&args.storage)
        .credentials(&args.user, &args.password)
        .space(&args.space)
        .connect_timeout(timeout)
        .request_timeout(Some(timeout))
        .build();

    let repo = match KvRepository::connect(&config) {
        Ok(repo) => repo,
        Err(e) => {
            eprintln!("error: {:?}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match args.command {
        Commands::Get { key } => repo.select(&key).map(|r| print_record(&r)),
        // values are stored as parsed, without surrounding whitespace
        Commands::Set { key, value } => repo.insert(&key, stored(&value)).map(|r| {
            println!("created {} ({} bytes)", r.key, r.size());
        }),
        Commands::Update { key, value } => repo.update(&key, stored(&value)).map(|r| {
            println!("updated {} ({} bytes)", r.key, r.size());
        }),
        Commands::Del { key } => repo.delete(&key).map(|r| print_record(&r)),
        Commands::Ping => match repo.ping() {
            Ok(()) => {
                println!("PONG");
                Ok(())
            }
            Err(e) => {
                eprintln!("error: {}", e);
                repo.close();
                return ExitCode::FAILURE;
            }
        },
    };

    repo.close();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
