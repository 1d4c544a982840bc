//! Tests for the TCP server
//!
//! These tests verify:
//! - Requests and responses over a real socket
//! - Error responses carry status codes
//! - Several clients served concurrently
//! - Graceful shutdown

use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::json;
use shelfstate::catalog::{BookRecord, MemoryCatalog};
use shelfstate::config::Config;
use shelfstate::engine::Engine;
use shelfstate::network::Server;
use shelfstate::protocol::{
    read_response, write_command, Command, Response, Status, MAX_PAYLOAD_SIZE,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    _temp: TempDir,
    addr: SocketAddr,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(vec![BookRecord::new(1, "Dune"), BookRecord::new(2, "Emma")])
    }

    fn start_with(books: Vec<BookRecord>) -> Self {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(temp.path())
            .listen_addr("127.0.0.1:0")
            .worker_threads(4)
            .read_timeout_ms(2000)
            .build();
        let catalog = Arc::new(MemoryCatalog::new(books));
        let engine = Arc::new(Engine::open(config.clone(), catalog).unwrap());

        let mut server = Server::bind(config, engine).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = thread::spawn(move || server.run().unwrap());

        Self {
            _temp: temp,
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn send(stream: &mut TcpStream, command: Command) -> Response {
    write_command(stream, &command).unwrap();
    read_response(stream).unwrap()
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_ping() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let response = send(&mut stream, Command::Ping);

    assert!(response.is_success());
    assert_eq!(response.body["status"], json!("success"));
    assert_eq!(response.body["pong"], json!(true));
}

#[test]
fn test_save_book_then_get_state() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let saved = send(
        &mut stream,
        Command::SaveBook {
            user: 9,
            body: json!({ "id": 2, "status": "lido", "progress_percent": 1.0 }),
        },
    );
    assert!(saved.is_success());
    assert_eq!(saved.body["id"], json!(2));

    let state = send(&mut stream, Command::GetState { user: 9 });
    assert!(state.is_success());
    assert_eq!(state.body["books"][1]["status"], json!("lido"));
    assert_eq!(state.body["books"][1]["read_status"], json!("finished"));
    assert_eq!(state.body["stats"]["finished"], json!(1));
}

#[test]
fn test_error_status_codes() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let not_found = send(
        &mut stream,
        Command::SaveBook {
            user: 1,
            body: json!({ "id": 404 }),
        },
    );
    let unsupported = send(
        &mut stream,
        Command::SaveBook {
            user: 1,
            body: json!({ "title": "New book" }),
        },
    );
    let invalid = send(
        &mut stream,
        Command::SaveBook {
            user: 1,
            body: json!({ "id": 1, "progress_percent": 7 }),
        },
    );

    assert_eq!(not_found.status, Status::NotFound);
    assert_eq!(unsupported.status, Status::Unsupported);
    assert_eq!(invalid.status, Status::BadRequest);
    for response in [&not_found, &unsupported, &invalid] {
        assert_eq!(response.body["status"], json!("error"));
        assert!(response.message().is_some());
    }
}

#[test]
fn test_connection_survives_errors() {
    let server = TestServer::start();
    let mut stream = server.connect();

    let error = send(
        &mut stream,
        Command::DeleteShelf {
            user: 1,
            body: json!({ "id": 55 }),
        },
    );
    let ok = send(&mut stream, Command::Ping);

    assert_eq!(error.status, Status::NotFound);
    assert!(ok.is_success());
}

#[test]
fn test_oversized_state_answers_with_error() {
    let mut book = BookRecord::new(1, "Dune");
    book.comments = Some("x".repeat(MAX_PAYLOAD_SIZE as usize));
    let server = TestServer::start_with(vec![book]);
    let mut stream = server.connect();

    let response = send(&mut stream, Command::GetState { user: 1 });
    let ok = send(&mut stream, Command::Ping);

    assert_eq!(response.status, Status::Error);
    assert_eq!(response.body["status"], json!("error"));
    assert_eq!(response.body["code"], json!(500));
    assert!(ok.is_success());
}

#[test]
fn test_concurrent_clients() {
    let server = TestServer::start();

    let handles: Vec<_> = (1..=4u64)
        .map(|user| {
            let mut stream = server.connect();
            thread::spawn(move || {
                let created = send(
                    &mut stream,
                    Command::SaveShelf {
                        user,
                        body: json!({ "name": "Shelf" }),
                    },
                );
                assert!(created.is_success());
                let shelf = created.body["id"].clone();

                let saved = send(
                    &mut stream,
                    Command::SaveBook {
                        user,
                        body: json!({ "id": 1, "shelves": [shelf] }),
                    },
                );
                assert!(saved.is_success());
                assert_eq!(saved.body["book"]["shelves"], json!([shelf]));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_shutdown_stops_server() {
    let mut server = TestServer::start();
    let addr = server.addr;

    server.shutdown.store(true, Ordering::SeqCst);
    server.handle.take().unwrap().join().unwrap();

    assert!(TcpStream::connect(addr).is_err());
}
