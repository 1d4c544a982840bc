//! shelfstate CLI Client
//!
//! Command-line interface for interacting with a shelfstate server.

use std::net::TcpStream;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use shelfstate::protocol::{read_response, write_command, Command, Response};
use shelfstate::state::UserId;
use shelfstate::{Result, ShelfError};

/// shelfstate CLI
#[derive(Parser, Debug)]
#[command(name = "shelfstate-cli")]
#[command(about = "CLI for the shelfstate reading-state server")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7480")]
    server: String,

    /// Acting user id
    #[arg(short, long, default_value = "1")]
    user: UserId,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show books, shelves, profile and stats
    State,

    /// Update one book (status, progress, shelves, extra metadata)
    Book {
        /// Book id
        id: u64,

        /// Status (unread, in_progress, finished)
        #[arg(long)]
        status: Option<String>,

        /// Progress fraction in [0, 1]
        #[arg(long)]
        progress: Option<f64>,

        /// Comma-separated shelf ids the book should be on
        #[arg(long, value_delimiter = ',')]
        shelves: Option<Vec<u64>>,

        /// Extra metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Forget status, progress and shelves of one book
    DeleteBook {
        /// Book id
        id: u64,
    },

    /// Create a shelf, or rename one with --id
    Shelf {
        /// Shelf name
        name: String,

        /// Shelf id to rename
        #[arg(long)]
        id: Option<u64>,

        /// Make the shelf public
        #[arg(long)]
        public: bool,
    },

    /// Delete a shelf
    DeleteShelf {
        /// Shelf id
        id: u64,
    },

    /// Add books to a shelf
    AddToShelf {
        /// Shelf id
        shelf: u64,

        /// Book ids
        #[arg(required = true)]
        books: Vec<u64>,
    },

    /// Import statuses from a JSON file of [{title, status}]
    Import {
        /// JSON file
        file: PathBuf,
    },

    /// Merge profile settings given as a JSON object
    Profile {
        /// Settings, e.g. '{"theme": "light"}'
        settings: String,
    },

    /// Upload an avatar image
    Avatar {
        /// Image file
        file: PathBuf,
    },

    /// Delete every status and progress record of the user
    Reset,

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = build_command(args.user, args.command).and_then(|cmd| send(&args.server, &cmd));
    match result {
        Ok(response) => {
            let pretty = serde_json::to_string_pretty(&response.body)
                .unwrap_or_else(|_| response.body.to_string());
            println!("{}", pretty);
            if response.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_command(user: UserId, command: Commands) -> Result<Command> {
    let command = match command {
        Commands::State => Command::GetState { user },
        Commands::Book {
            id,
            status,
            progress,
            shelves,
            metadata,
        } => {
            let mut body = match metadata {
                Some(raw) => parse_json(&raw)?,
                None => json!({}),
            };
            let fields = body
                .as_object_mut()
                .ok_or_else(|| ShelfError::validation("--metadata must be a JSON object"))?;
            fields.insert("id".to_string(), json!(id));
            if let Some(status) = status {
                fields.insert("status".to_string(), json!(status));
            }
            if let Some(progress) = progress {
                fields.insert("progress_percent".to_string(), json!(progress));
            }
            if let Some(shelves) = shelves {
                fields.insert("shelves".to_string(), json!(shelves));
            }
            Command::SaveBook { user, body }
        }
        Commands::DeleteBook { id } => Command::DeleteBook {
            user,
            body: json!({ "id": id }),
        },
        Commands::Shelf { name, id, public } => {
            let mut body = json!({ "name": name, "is_public": public });
            if let Some(id) = id {
                body["id"] = json!(id);
            }
            Command::SaveShelf { user, body }
        }
        Commands::DeleteShelf { id } => Command::DeleteShelf {
            user,
            body: json!({ "id": id }),
        },
        Commands::AddToShelf { shelf, books } => Command::AddShelfMembers {
            user,
            body: json!({ "shelfId": shelf, "bookIds": books }),
        },
        Commands::Import { file } => {
            let books = parse_json(&std::fs::read_to_string(&file)?)?;
            Command::Import {
                user,
                body: json!({ "books": books }),
            }
        }
        Commands::Profile { settings } => Command::UpdateProfile {
            user,
            body: parse_json(&settings)?,
        },
        Commands::Avatar { file } => {
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Command::UploadAvatar {
                user,
                filename,
                data: std::fs::read(&file)?,
            }
        }
        Commands::Reset => Command::ResetAll { user },
        Commands::Ping => Command::Ping,
    };
    Ok(command)
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| ShelfError::Validation(format!("invalid JSON: {}", e)))
}

fn send(server: &str, command: &Command) -> Result<Response> {
    let mut stream = TcpStream::connect(server)
        .map_err(|e| ShelfError::Network(format!("Failed to connect to {}: {}", server, e)))?;
    write_command(&mut stream, command)?;
    read_response(&mut stream)
}
