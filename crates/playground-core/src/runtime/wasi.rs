//! WASI interpreter runtime backed by wasmtime.
//!
//! The provider fetches an interpreter module (a CPython build for
//! `wasm32-wasip1`, by default) from a URL or a local path, optionally checks
//! its SHA-256, and compiles it once. Each run instantiates the compiled
//! module in a fresh store with the program text passed through argv.
//! Stdout and stderr go to bounded memory pipes that are polled while the
//! guest runs, so output streams out and survives a trap.

use super::{Interpreter, InterpreterExit, InterpreterProvider, OutputChunk};
use crate::config::{PreopenDir, WasmConfig, SOURCE_PLACEHOLDER};
use crate::errors::{InterpreterFault, LoadError};
use crate::output::Stream;
use crate::registry::{LanguageDescriptor, LanguageId};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wasmtime::{Engine, Linker, Module, Store};
use wasmtime_wasi::p1::WasiP1Ctx;
use wasmtime_wasi::p2::pipe::MemoryOutputPipe;
use wasmtime_wasi::{DirPerms, FilePerms, WasiCtxBuilder};

/// How often guest output is moved from the memory pipes to the caller.
const OUTPUT_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct WasiInterpreterProvider {
    config: WasmConfig,
    client: reqwest::Client,
}

impl WasiInterpreterProvider {
    pub fn new(config: WasmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_module(&self, language: LanguageId) -> Result<Vec<u8>, LoadError> {
        let location = self.config.module.as_str();
        if location.starts_with("http://") || location.starts_with("https://") {
            log::info!("Downloading {} interpreter from: {}", language, location);
            let response = self
                .client
                .get(location)
                .send()
                .await
                .map_err(|e| LoadError::new(language, format!("Failed to fetch module: {}", e)))?;
            if !response.status().is_success() {
                return Err(LoadError::new(
                    language,
                    format!("Failed to fetch module: HTTP {}", response.status()),
                ));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| LoadError::new(language, format!("Failed to read module body: {}", e)))?;
            Ok(bytes.to_vec())
        } else {
            log::info!("Reading {} interpreter from: {}", language, location);
            tokio::fs::read(location).await.map_err(|e| {
                LoadError::new(language, format!("Failed to read module {}: {}", location, e))
            })
        }
    }
}

fn verify_digest(bytes: &[u8], expected: &str) -> Result<(), String> {
    let actual = format!("{:x}", Sha256::digest(bytes));
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(format!(
            "Module digest mismatch: expected {}, got {}",
            expected, actual
        ))
    }
}

#[async_trait]
impl InterpreterProvider for WasiInterpreterProvider {
    async fn acquire(
        &self,
        descriptor: &LanguageDescriptor,
    ) -> Result<Arc<dyn Interpreter>, LoadError> {
        let language = descriptor.id;
        let bytes = self.fetch_module(language).await?;

        if let Some(expected) = &self.config.sha256 {
            verify_digest(&bytes, expected).map_err(|m| LoadError::new(language, m))?;
        }

        log::debug!("Compiling {} byte interpreter module", bytes.len());
        let (engine, module) = tokio::task::spawn_blocking(move || {
            let engine = Engine::default();
            let module = Module::new(&engine, &bytes)
                .map_err(|e| format!("Failed to compile module: {}", e))?;
            Ok::<_, String>((engine, module))
        })
        .await
        .map_err(|e| LoadError::new(language, e.to_string()))?
        .map_err(|m| LoadError::new(language, m))?;

        Ok(Arc::new(WasiInterpreter {
            name: format!("wasi:{}", descriptor.display_name.to_lowercase()),
            engine,
            module,
            args: self.config.args.clone(),
            preopens: self.config.preopens.clone(),
            max_output_bytes: self.config.max_output_bytes,
        }))
    }
}

pub struct WasiInterpreter {
    name: String,
    engine: Engine,
    module: Module,
    args: Vec<String>,
    preopens: Vec<PreopenDir>,
    max_output_bytes: usize,
}

/// Forwards whatever the guest appended to a memory pipe since the last call.
struct PipeForwarder {
    pipe: MemoryOutputPipe,
    stream: Stream,
    forwarded: usize,
}

impl PipeForwarder {
    fn new(pipe: MemoryOutputPipe, stream: Stream) -> Self {
        Self {
            pipe,
            stream,
            forwarded: 0,
        }
    }

    fn forward(&mut self, output: &mpsc::UnboundedSender<OutputChunk>, last: bool) {
        let contents = self.pipe.contents();
        let fresh = &contents[self.forwarded..];
        if fresh.is_empty() {
            return;
        }

        let consumed = match std::str::from_utf8(fresh) {
            Ok(_) => fresh.len(),
            // Hold back a character split across two polls
            Err(e) if e.error_len().is_none() && !last => e.valid_up_to(),
            Err(_) => fresh.len(),
        };
        if consumed == 0 {
            return;
        }
        self.forwarded += consumed;

        let text = String::from_utf8_lossy(&fresh[..consumed]).into_owned();
        let _ = output.send(OutputChunk {
            stream: self.stream,
            text,
        });
    }

    fn reached(&self, limit: usize) -> bool {
        self.pipe.contents().len() >= limit
    }
}

fn build_argv(template: &[String], source: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace(SOURCE_PLACEHOLDER, source))
        .collect()
}

impl WasiInterpreter {
    /// Runs `_start` to completion. Returns the exit code, or the trap message
    /// when the guest did not exit on its own.
    fn execute_sync(
        engine: &Engine,
        module: &Module,
        argv: &[String],
        preopens: &[PreopenDir],
        stdout: MemoryOutputPipe,
        stderr: MemoryOutputPipe,
    ) -> Result<i32, String> {
        let mut builder = WasiCtxBuilder::new();
        builder.args(argv).stdout(stdout).stderr(stderr);

        for preopen in preopens {
            if let Err(e) = builder.preopened_dir(&preopen.host, &preopen.guest, DirPerms::READ, FilePerms::READ) {
                log::warn!(
                    "Could not preopen {} as {}, skipping: {}",
                    preopen.host.display(),
                    preopen.guest,
                    e
                );
            }
        }

        let wasi_ctx = builder.build_p1();
        let mut store = Store::new(engine, wasi_ctx);

        let mut linker = Linker::new(engine);
        wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |ctx: &mut WasiP1Ctx| ctx)
            .map_err(|e| format!("Failed to link WASI: {}", e))?;

        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| format!("Failed to instantiate module: {}", e))?;
        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| format!("No _start entry point: {}", e))?;

        match start.call(&mut store, ()) {
            Ok(()) => Ok(0),
            Err(e) => match e.downcast_ref::<wasmtime_wasi::I32Exit>() {
                Some(exit) => Ok(exit.0),
                None => Err(format!("Interpreter trapped: {}", e)),
            },
        }
    }
}

#[async_trait]
impl Interpreter for WasiInterpreter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        source: &str,
        output: mpsc::UnboundedSender<OutputChunk>,
    ) -> Result<InterpreterExit, InterpreterFault> {
        let engine = self.engine.clone();
        let module = self.module.clone();
        let argv = build_argv(&self.args, source);
        let preopens = self.preopens.clone();
        let limit = self.max_output_bytes;

        let stdout_pipe = MemoryOutputPipe::new(limit);
        let stderr_pipe = MemoryOutputPipe::new(limit);
        let mut forwarders = [
            PipeForwarder::new(stdout_pipe.clone(), Stream::Stdout),
            PipeForwarder::new(stderr_pipe.clone(), Stream::Stderr),
        ];

        let mut worker = tokio::task::spawn_blocking(move || {
            Self::execute_sync(&engine, &module, &argv, &preopens, stdout_pipe, stderr_pipe)
        });

        let mut ticker = tokio::time::interval(OUTPUT_POLL_INTERVAL);
        let joined = loop {
            tokio::select! {
                joined = &mut worker => break joined,
                _ = ticker.tick() => {
                    for forwarder in forwarders.iter_mut() {
                        forwarder.forward(&output, false);
                    }
                }
            }
        };

        // Whatever the guest wrote is delivered, even when it trapped
        for forwarder in forwarders.iter_mut() {
            forwarder.forward(&output, true);
        }
        if forwarders.iter().any(|f| f.reached(limit)) {
            log::warn!("{} output reached the {} byte limit", self.name, limit);
            let _ = output.send(OutputChunk::stderr(format!(
                "[output truncated at {} bytes]\n",
                limit
            )));
        }

        let exit_code = joined
            .map_err(|e| InterpreterFault(e.to_string()))?
            .map_err(InterpreterFault)?;
        Ok(InterpreterExit { exit_code })
    }
}
