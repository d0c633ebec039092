// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload decoder gateway.
//!
//! The service does not understand the application payload itself. A
//! reassembled buffer is handed to an external decoder (typically the
//! vendor's JavaScript TTN codec) through the [`DecoderGateway`] trait.
//!
//! # Process protocol
//!
//! [`ProcessDecoder`] runs the configured command once per frame, writes a
//! single JSON request on its stdin and reads a single JSON document back
//! from its stdout:
//!
//! ```text
//! stdin : {"function": "te_decoder", "bytes": [21, 47, ...], "fPort": 10}
//! stdout: {"data": {...}, "errors": []}        decoded result
//!         {"error": "te_decoder not found"}    decoder failure
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Structured decoder output, forwarded untouched to the sinks.
pub type DecodedResult = serde_json::Value;

/// Decoder errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to start decoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("decoder I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoder exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("decoder returned invalid JSON: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("decoder reported an error: {0}")]
    Decoder(String),

    #[error("decoder timed out after {0:?}")]
    Timeout(Duration),
}

/// Turns a reassembled payload into structured data.
///
/// Implementations may be slow (cross-process); callers never hold the
/// fragment store lock while decoding.
#[async_trait]
pub trait DecoderGateway: Send + Sync {
    /// Decode `payload` received on `f_port`.
    async fn decode(&self, payload: &[u8], f_port: u8) -> Result<DecodedResult, DecodeError>;
}

#[derive(Serialize)]
struct DecodeRequest<'a> {
    function: &'a str,
    bytes: &'a [u8],
    #[serde(rename = "fPort")]
    f_port: u8,
}

/// Decoder running an external command per request.
#[derive(Debug, Clone)]
pub struct ProcessDecoder {
    program: String,
    args: Vec<String>,
    function: String,
    timeout: Duration,
}

impl ProcessDecoder {
    /// Create a decoder from a command line (`[program, args...]`).
    ///
    /// An empty command yields a decoder failing every request with
    /// [`DecodeError::Spawn`]; config validation rejects it earlier.
    pub fn new(command: &[String], function: impl Into<String>, timeout: Duration) -> Self {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };

        Self {
            program,
            args,
            function: function.into(),
            timeout,
        }
    }

    /// Decoder entry point called by the helper.
    pub fn function(&self) -> &str {
        &self.function
    }

    async fn run(&self, request: Vec<u8>) -> Result<DecodedResult, DecodeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DecodeError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(DecodeError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let result: DecodedResult = serde_json::from_slice(&output.stdout)?;
        if let Some(error) = result.get("error") {
            let message = error
                .as_str()
                .map_or_else(|| error.to_string(), str::to_string);
            return Err(DecodeError::Decoder(message));
        }

        Ok(result)
    }
}

#[async_trait]
impl DecoderGateway for ProcessDecoder {
    async fn decode(&self, payload: &[u8], f_port: u8) -> Result<DecodedResult, DecodeError> {
        let request = serde_json::to_vec(&DecodeRequest {
            function: &self.function,
            bytes: payload,
            f_port,
        })?;

        // Dropping the future kills the child (kill_on_drop).
        match tokio::time::timeout(self.timeout, self.run(request)).await {
            Ok(result) => result,
            Err(_) => Err(DecodeError::Timeout(self.timeout)),
        }
    }
}
