// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Execution environment abstraction
//!
//! The bridge never knows what "executing code" means. It hands the payload
//! to an [`ExecutionEnvironment`] owned exclusively by the owner thread and
//! gets back either a delta or a structured failure. [`InMemoryEnvironment`]
//! is the reference implementation used by the daemon and the test suite.

use std::collections::BTreeSet;

use crate::work::SceneSnapshot;

/// Raw failure as produced by an environment, before classification.
#[derive(Debug, Clone)]
pub struct FailureDescriptor {
    /// Error kind tag, e.g. `NameError`
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Multi-line trace with `, line N` frame markers
    pub trace: String,
}

impl FailureDescriptor {
    pub fn at_line(kind: &str, message: &str, line: usize) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.to_string(),
            trace: format!(
                "Traceback (most recent call last):\n  Script \"<submitted>\", line {}, in <submitted>\n{}: {}",
                line, kind, message
            ),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct EnvironmentDelta {
    /// Entities that exist now but did not before the run
    pub created_entities: BTreeSet<String>,
    /// State after the run
    pub snapshot: SceneSnapshot,
}

/// Anything the owner thread can execute code against.
///
/// Implementations are `Send` so the environment can move onto the owner
/// thread at start, but they are never shared: only that thread calls these
/// methods.
pub trait ExecutionEnvironment: Send {
    /// Execute a payload to completion. `context` is the state observed at
    /// submission time, for implementations that want to diff against it.
    fn run(
        &mut self,
        code: &str,
        context: &SceneSnapshot,
    ) -> Result<EnvironmentDelta, FailureDescriptor>;

    /// Current state, cheap enough to call after every run.
    fn snapshot(&self) -> SceneSnapshot;
}

/// In-memory environment interpreting a small line-oriented command language.
///
/// Commands, one per line:
/// - `spawn NAME`   create an entity; duplicate name raises `ValueError`
/// - `remove NAME`  delete an entity; unknown name raises `KeyError`
/// - `div A B`      numeric division; `B` of zero raises `ZeroDivisionError`
/// - `sleep MS`     block the owner thread for `MS` milliseconds
/// - `fail KIND MESSAGE...`  raise an arbitrary error kind
/// - blank lines and `#` comments are skipped
///
/// Any other first word raises `NameError`, mirroring how a real scripting
/// host reports unknown symbols.
#[derive(Debug, Default)]
pub struct InMemoryEnvironment {
    entities: BTreeSet<String>,
}

impl InMemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    fn execute_line(&mut self, line_no: usize, line: &str) -> Result<(), FailureDescriptor> {
        let mut parts = line.split_whitespace();
        let command = match parts.next() {
            Some(word) => word,
            None => return Ok(()),
        };
        match command {
            "spawn" => {
                let name = parts.next().ok_or_else(|| {
                    FailureDescriptor::at_line(
                        "TypeError",
                        "spawn() missing required argument: name",
                        line_no,
                    )
                })?;
                if !self.entities.insert(name.to_string()) {
                    return Err(FailureDescriptor::at_line(
                        "ValueError",
                        &format!("entity '{}' already exists", name),
                        line_no,
                    ));
                }
                Ok(())
            }
            "remove" => {
                let name = parts.next().ok_or_else(|| {
                    FailureDescriptor::at_line(
                        "TypeError",
                        "remove() missing required argument: name",
                        line_no,
                    )
                })?;
                if !self.entities.remove(name) {
                    return Err(FailureDescriptor::at_line(
                        "KeyError",
                        &format!("'{}'", name),
                        line_no,
                    ));
                }
                Ok(())
            }
            "div" => {
                let parse = |word: Option<&str>| -> Result<f64, FailureDescriptor> {
                    word.and_then(|w| w.parse::<f64>().ok()).ok_or_else(|| {
                        FailureDescriptor::at_line(
                            "TypeError",
                            "div() arguments must be numeric",
                            line_no,
                        )
                    })
                };
                let a = parse(parts.next())?;
                let b = parse(parts.next())?;
                if b == 0.0 {
                    return Err(FailureDescriptor::at_line(
                        "ZeroDivisionError",
                        "division by zero",
                        line_no,
                    ));
                }
                let _ = a / b;
                Ok(())
            }
            "sleep" => {
                let millis = parts.next().and_then(|w| w.parse::<u64>().ok()).ok_or_else(|| {
                    FailureDescriptor::at_line(
                        "TypeError",
                        "sleep() requires a millisecond count",
                        line_no,
                    )
                })?;
                std::thread::sleep(std::time::Duration::from_millis(millis));
                Ok(())
            }
            "fail" => {
                let kind = parts.next().unwrap_or("RuntimeError").to_string();
                let message = parts.collect::<Vec<_>>().join(" ");
                let message = if message.is_empty() {
                    "requested failure".to_string()
                } else {
                    message
                };
                Err(FailureDescriptor::at_line(&kind, &message, line_no))
            }
            other => Err(FailureDescriptor::at_line(
                "NameError",
                &format!("name '{}' is not defined", other),
                line_no,
            )),
        }
    }
}

impl ExecutionEnvironment for InMemoryEnvironment {
    fn run(
        &mut self,
        code: &str,
        _context: &SceneSnapshot,
    ) -> Result<EnvironmentDelta, FailureDescriptor> {
        let before: BTreeSet<String> = self.entities.clone();
        for (idx, line) in code.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.execute_line(idx + 1, trimmed)?;
        }
        let created_entities: BTreeSet<String> =
            self.entities.difference(&before).cloned().collect();
        Ok(EnvironmentDelta {
            created_entities,
            snapshot: self.snapshot(),
        })
    }

    fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot::new(self.entities.iter().cloned().collect())
    }
}
