// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests over a full bridge: HTTP ingress, owner thread, and
//! egress delivery against a local capture server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use hostlink::{HostlinkConfig, InMemoryEnvironment, Server, ServerError};

/// Minimal HTTP server that records request bodies and answers 200.
fn spawn_capture_server() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let bodies_inner = Arc::clone(&bodies);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(s) => s,
                Err(_) => return,
            };
            let mut buf = Vec::new();
            let mut chunk = [0u8; 2048];
            loop {
                let n = stream.read(&mut chunk).unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                    let length = headers
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        let body = String::from_utf8_lossy(&buf[end + 4..end + 4 + length]);
                        bodies_inner.lock().unwrap().push(body.to_string());
                        break;
                    }
                }
            }
            let _ = stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        }
    });
    (url, bodies)
}

fn test_config(egress_url: &str) -> HostlinkConfig {
    let mut config = HostlinkConfig::default();
    config.server.listen_port = 0;
    config.scheduler.tick_interval_ms = 10;
    config.execution.max_execution_secs = 5;
    config.egress.result_url = egress_url.to_string();
    config.egress.prompt_url = egress_url.to_string();
    config.egress.request_timeout_secs = 2;
    config
}

fn start_bridge(egress_url: &str) -> (Server, String) {
    let mut server = Server::new(test_config(egress_url)).unwrap();
    server.start(Box::new(InMemoryEnvironment::new())).unwrap();
    let url = format!("http://{}/", server.local_addr().unwrap());
    (server, url)
}

fn wait_for<F: Fn() -> bool>(deadline: Duration, check: F) -> bool {
    let started = Instant::now();
    while started.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn code_submission_executes_and_mutates_scene() {
    let (egress_url, _bodies) = spawn_capture_server();
    let (mut server, url) = start_bridge(&egress_url);
    let client = reqwest::blocking::Client::new();

    let response = client
        .post(&url)
        .json(&serde_json::json!({"code": "spawn cube\nspawn lamp"}))
        .send()
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["execution_status"], "success");
    assert_eq!(body["code_executed"], true);
    assert_eq!(body["objects_created"], 2);
    assert_eq!(body["new_objects"][0], "cube");

    // State persists across submissions on the same environment.
    let response = client
        .post(&url)
        .json(&serde_json::json!({"code": "remove cube"}))
        .send()
        .unwrap();
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["execution_status"], "success");

    server.stop();
}

#[test]
fn arithmetic_failure_is_classified_with_suggestions() {
    let (egress_url, _bodies) = spawn_capture_server();
    let (mut server, url) = start_bridge(&egress_url);
    let client = reqwest::blocking::Client::new();

    let response = client
        .post(&url)
        .json(&serde_json::json!({"code": "div 1 0"}))
        .send()
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["execution_status"], "failed");
    assert_eq!(body["code_executed"], false);
    assert_eq!(body["error"], "ZeroDivisionError: division by zero");
    assert_eq!(body["error_category"], "arithmetic");
    assert_eq!(body["error_type"], "ZeroDivisionError");
    assert_eq!(body["error_line"], 1);
    assert!(body["fix_suggestions"].as_array().unwrap().len() >= 1);
    assert!(body["problematic_section"]
        .as_str()
        .unwrap()
        .contains("div 1 0"));

    server.stop();
}

#[test]
fn prompt_is_accepted_and_delivered_to_egress() {
    let (egress_url, bodies) = spawn_capture_server();
    let (mut server, url) = start_bridge(&egress_url);
    let client = reqwest::blocking::Client::new();

    let response = client
        .post(&url)
        .json(&serde_json::json!({"prompt": "a red chair"}))
        .send()
        .unwrap();
    assert_eq!(response.status(), 200);
    let ack: serde_json::Value = response.json().unwrap();
    assert_eq!(ack["status"], "accepted");
    assert!(!ack["job_id"].as_str().unwrap().is_empty());

    // The owner thread forwards the prompt and the worker posts it out.
    let delivered = wait_for(Duration::from_secs(3), || !bodies.lock().unwrap().is_empty());
    assert!(delivered, "prompt ack never reached the egress endpoint");
    let body: serde_json::Value =
        serde_json::from_str(&bodies.lock().unwrap()[0]).unwrap();
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["prompt"], "a red chair");
    assert_eq!(body["execution"], "processing");

    server.stop();
}

#[test]
fn oversized_code_is_rejected_as_failure_result() {
    let (egress_url, _bodies) = spawn_capture_server();
    let (mut server, url) = start_bridge(&egress_url);
    let client = reqwest::blocking::Client::new();

    let big = "x".repeat(60_000);
    let response = client
        .post(&url)
        .json(&serde_json::json!({"code": big}))
        .send()
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["execution_status"], "failed");
    assert_eq!(body["code_executed"], false);
    assert_eq!(body["error_category"], "invalid_value");

    server.stop();
}

#[test]
fn health_endpoint_reflects_scene_state() {
    let (egress_url, _bodies) = spawn_capture_server();
    let (mut server, url) = start_bridge(&egress_url);
    let client = reqwest::blocking::Client::new();

    client
        .post(&url)
        .json(&serde_json::json!({"code": "spawn tree"}))
        .send()
        .unwrap();

    let response = client.get(&url).send().unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["scene_summary"].as_str().unwrap().contains("tree"));
    assert_eq!(body["current_scene"]["entities"][0], "tree");

    server.stop();
}

#[test]
fn lifecycle_double_start_fails_and_restart_works() {
    let (egress_url, _bodies) = spawn_capture_server();
    let (mut server, url) = start_bridge(&egress_url);

    assert!(matches!(
        server.start(Box::new(InMemoryEnvironment::new())),
        Err(ServerError::AlreadyRunning)
    ));

    server.stop();
    server.stop();
    assert!(!server.is_running());

    // Restart gets a fresh environment.
    drop(url);
    server.start(Box::new(InMemoryEnvironment::new())).unwrap();
    let new_url = format!("http://{}/", server.local_addr().unwrap());

    let client = reqwest::blocking::Client::new();
    let response = client
        .post(&new_url)
        .json(&serde_json::json!({"code": "spawn fresh"}))
        .send()
        .unwrap();
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["execution_status"], "success");

    server.stop();
}
