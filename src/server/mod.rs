use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use crate::perks::PerkEngine;

pub mod api;
pub mod routes;

pub const BIND_ENV: &str = "PERKEVAL_BIND";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Bind address from `PERKEVAL_BIND`, or the default.
pub fn bind_addr_from_env() -> String {
    std::env::var(BIND_ENV)
        .ok()
        .filter(|addr| !addr.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
}

pub fn run_server(bind_addr: &str, engine: PerkEngine) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    tracing::info!(target: "perkeval::server", addr = bind_addr, "server.listening");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&engine, &mut stream) {
                    tracing::warn!(target: "perkeval::server", error = %err, "request.failed");
                }
            }
            Err(err) => {
                tracing::warn!(target: "perkeval::server", error = %err, "connection.failed")
            }
        }
    }

    Ok(())
}

fn handle_connection(engine: &PerkEngine, stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buffer = [0_u8; 16_384];
    let bytes_read = stream.read(&mut buffer)?;
    if bytes_read == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..bytes_read]);
    let mut lines = request.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next().unwrap_or("GET");
    let path = request_parts.next().unwrap_or("/");

    let body = request
        .split("\r\n\r\n")
        .nth(1)
        .or_else(|| request.split("\n\n").nth(1))
        .unwrap_or("");

    let response = routes::route_request(engine, method, path, body);
    tracing::debug!(
        target: "perkeval::server",
        method,
        path,
        status = response.status_code,
        "request.handled"
    );
    stream.write_all(response.to_http_string().as_bytes())?;
    stream.flush()?;
    Ok(())
}
