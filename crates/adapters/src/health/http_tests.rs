// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

/// Serve a single HTTP response with the given status line, returning the URL
fn serve_once(status_line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else {
            return;
        };
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        // Consume request headers
        let mut line = String::new();
        while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            if line == "\r\n" {
                break;
            }
            line.clear();
        }
        let mut stream = stream;
        let _ = write!(
            stream,
            "{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status_line
        );
    });

    format!("http://{}/ping", addr)
}

#[tokio::test]
async fn ok_response_is_healthy() {
    let checker = HttpHealthChecker::new(serve_once("HTTP/1.1 200 OK"), Duration::from_secs(5));
    assert!(checker.check().await.is_ok());
}

#[tokio::test]
async fn error_status_is_unhealthy() {
    let checker = HttpHealthChecker::new(
        serve_once("HTTP/1.1 503 Service Unavailable"),
        Duration::from_secs(5),
    );
    assert!(matches!(
        checker.check().await,
        Err(HealthError::Status(503))
    ));
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    // Bind then drop to get a port nobody listens on
    let addr = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let checker =
        HttpHealthChecker::new(format!("http://{}/ping", addr), Duration::from_secs(2));

    assert!(matches!(
        checker.check().await,
        Err(HealthError::Unreachable(_))
    ));
}
