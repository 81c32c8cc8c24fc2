//! Evaluation service client: request/response types, a persistent
//! process-backed evaluator and a scoped pool of evaluators.

use super::snapshot::SemanticSnapshot;
use crate::config::EvaluatorConfig;
use crate::error::{Result, TreegraftError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub id: u64,
    #[serde(rename = "script")]
    pub source_text: String,
    #[serde(rename = "variables")]
    pub variable_names: Vec<String>,
    #[serde(rename = "timeout")]
    pub timeout_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResponse {
    Snapshot(SemanticSnapshot),
    /// Exception, timeout or transport failure reported for this request.
    Error(String),
}

impl EvaluationResponse {
    /// Parses one reply line. Malformed replies become `Error`.
    pub fn from_json_line(line: &str) -> Self {
        Self::parse(line).unwrap_or_else(EvaluationResponse::Error)
    }

    fn parse(line: &str) -> std::result::Result<Self, String> {
        let value: Value =
            serde_json::from_str(line.trim()).map_err(|e| format!("Malformed evaluator reply: {}", e))?;
        let Value::Object(map) = value else {
            return Err(format!("Evaluator reply is not an object: {}", line.trim()));
        };
        if let Some(exception) = map.get("exception") {
            let message = match exception {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(EvaluationResponse::Error(message));
        }
        map.into_iter()
            .map(|(name, values)| match values {
                Value::Array(items) => Ok((name, items)),
                other => Err(format!("Trace of '{}' is not a list: {}", name, other)),
            })
            .collect::<std::result::Result<SemanticSnapshot, String>>()
            .map(EvaluationResponse::Snapshot)
    }

    pub fn snapshot(&self) -> Option<&SemanticSnapshot> {
        match self {
            EvaluationResponse::Snapshot(s) => Some(s),
            EvaluationResponse::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EvaluationResponse::Error(_))
    }
}

/// Synchronous evaluation boundary. Failures are reported in the response, never raised.
pub trait Evaluator: Send {
    fn evaluate(&mut self, request: &EvaluationRequest) -> EvaluationResponse;
}

struct RunningProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<std::io::Result<String>>,
}

/// Evaluator backed by a long-lived child process speaking line-delimited JSON.
pub struct ProcessEvaluator {
    command: String,
    args: Vec<String>,
    grace: Duration,
    running: Option<RunningProcess>,
}

impl ProcessEvaluator {
    pub fn new(command: &str, args: &[String], grace: Duration) -> Self {
        Self {
            command: command.to_string(),
            args: args.to_vec(),
            grace,
            running: None,
        }
    }

    pub fn from_config(config: &EvaluatorConfig) -> Self {
        Self::new(
            &config.command,
            &config.args,
            Duration::try_from_secs_f64(config.response_grace_seconds).unwrap_or(Duration::ZERO),
        )
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn spawn(&self) -> Result<RunningProcess> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| TreegraftError::Evaluator(format!("Failed to spawn '{}': {}", self.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TreegraftError::Evaluator("stdin was not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TreegraftError::Evaluator("stdout was not piped".to_string()))?;

        let (sender, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                if sender.send(line).is_err() {
                    break;
                }
            }
        });

        log::info!("Started evaluator process '{}' (pid {})", self.command, child.id());
        Ok(RunningProcess { child, stdin, lines })
    }

    fn stop(&mut self) {
        if let Some(mut process) = self.running.take() {
            if let Err(e) = process.child.kill() {
                log::debug!("Evaluator process already gone: {}", e);
            }
            let _ = process.child.wait();
            log::info!("Stopped evaluator process '{}'", self.command);
        }
    }

    fn exchange(&mut self, request: &EvaluationRequest) -> std::result::Result<EvaluationResponse, String> {
        if self.running.is_none() {
            self.running = Some(self.spawn().map_err(|e| e.to_string())?);
        }
        let process = self
            .running
            .as_mut()
            .ok_or_else(|| "Evaluator process unavailable".to_string())?;

        let mut line = serde_json::to_string(request).map_err(|e| e.to_string())?;
        line.push('\n');
        process
            .stdin
            .write_all(line.as_bytes())
            .and_then(|_| process.stdin.flush())
            .map_err(|e| format!("Failed to send request {}: {}", request.id, e))?;

        let deadline = Duration::try_from_secs_f64(request.timeout_seconds).unwrap_or(Duration::ZERO) + self.grace;
        match process.lines.recv_timeout(deadline) {
            Ok(Ok(reply)) => EvaluationResponse::parse(&reply),
            Ok(Err(e)) => Err(format!("Failed to read reply to request {}: {}", request.id, e)),
            Err(RecvTimeoutError::Timeout) => Err(format!(
                "No reply to request {} within {:?}",
                request.id, deadline
            )),
            Err(RecvTimeoutError::Disconnected) => Err("Evaluator process closed its output".to_string()),
        }
    }
}

impl Evaluator for ProcessEvaluator {
    fn evaluate(&mut self, request: &EvaluationRequest) -> EvaluationResponse {
        match self.exchange(request) {
            Ok(response) => response,
            Err(message) => {
                log::warn!("{}; restarting evaluator on next request", message);
                self.stop();
                EvaluationResponse::Error(message)
            }
        }
    }
}

impl Drop for ProcessEvaluator {
    fn drop(&mut self) {
        self.stop();
    }
}

type EvaluatorFactory = Box<dyn Fn() -> Result<Box<dyn Evaluator>> + Send + Sync>;

struct PoolState {
    idle: Vec<Box<dyn Evaluator>>,
    created: usize,
}

/// Bounded set of evaluators, created lazily and handed out one per session.
pub struct EvaluatorPool {
    factory: EvaluatorFactory,
    capacity: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl EvaluatorPool {
    pub fn new<F>(capacity: usize, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<Box<dyn Evaluator>> + Send + Sync + 'static,
    {
        if capacity == 0 {
            return Err(TreegraftError::Configuration(
                "Evaluator pool size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            factory: Box::new(factory),
            capacity,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                created: 0,
            }),
            available: Condvar::new(),
        })
    }

    /// Pool of `ProcessEvaluator`s running the configured command.
    pub fn from_config(config: &EvaluatorConfig) -> Result<Self> {
        let config = config.clone();
        Self::new(config.pool_size, move || {
            Ok(Box::new(ProcessEvaluator::from_config(&config)) as Box<dyn Evaluator>)
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).idle.len()
    }

    /// Blocks until an evaluator is free. The session returns it on drop.
    pub fn acquire(&self) -> Result<EvaluatorSession<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(evaluator) = state.idle.pop() {
                return Ok(EvaluatorSession {
                    pool: self,
                    evaluator: Some(evaluator),
                });
            }
            if state.created < self.capacity {
                state.created += 1;
                drop(state);
                return match (self.factory)() {
                    Ok(evaluator) => Ok(EvaluatorSession {
                        pool: self,
                        evaluator: Some(evaluator),
                    }),
                    Err(e) => {
                        self.state.lock().unwrap_or_else(PoisonError::into_inner).created -= 1;
                        self.available.notify_one();
                        Err(e)
                    }
                };
            }
            state = self.available.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn release(&self, evaluator: Box<dyn Evaluator>) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .idle
            .push(evaluator);
        self.available.notify_one();
    }
}

/// Exclusive use of one pooled evaluator.
pub struct EvaluatorSession<'p> {
    pool: &'p EvaluatorPool,
    evaluator: Option<Box<dyn Evaluator>>,
}

impl Evaluator for EvaluatorSession<'_> {
    fn evaluate(&mut self, request: &EvaluationRequest) -> EvaluationResponse {
        match self.evaluator.as_mut() {
            Some(evaluator) => evaluator.evaluate(request),
            None => EvaluationResponse::Error("Session already released".to_string()),
        }
    }
}

impl Drop for EvaluatorSession<'_> {
    fn drop(&mut self) {
        if let Some(evaluator) = self.evaluator.take() {
            self.pool.release(evaluator);
        }
    }
}
