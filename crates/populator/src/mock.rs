//! In-memory seams for unit testing
//!
//! `MockSecretSource` serves Secrets from a map and `MockCommandRunner` records
//! invocations instead of spawning processes, so the pipeline can run without a
//! cluster or an `ovirt-img` binary.

use crate::credentials::SecretSource;
use crate::error::PopulatorError;
use crate::transfer::{CommandOutput, CommandRunner};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Mock Secret store
#[derive(Debug, Clone, Default)]
pub struct MockSecretSource {
    secrets: Arc<Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>>,
    fetches: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockSecretSource {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Secret with text values (for test setup)
    pub fn add_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let data: Vec<(&str, &[u8])> = data.iter().map(|(key, value)| (*key, value.as_bytes())).collect();
        self.add_secret_bytes(namespace, name, &data);
    }

    /// Add a Secret with raw values (for test setup)
    pub fn add_secret_bytes(&self, namespace: &str, name: &str, data: &[(&str, &[u8])]) {
        let data = data
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_vec()))
            .collect();
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
    }

    /// `(namespace, name)` of every fetch, in order
    pub fn fetches(&self) -> Vec<(String, String)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SecretSource for MockSecretSource {
    async fn secret_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>, PopulatorError> {
        self.fetches
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));

        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| PopulatorError::SecretFetch {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("secrets \"{name}\" not found"),
                )),
            })
    }
}

/// Mock command runner returning a canned result
#[derive(Debug, Clone)]
pub struct MockCommandRunner {
    result: CommandOutput,
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl MockCommandRunner {
    /// Every run exits 0 with `output`
    pub fn succeeding(output: &str) -> Self {
        Self::with_result(CommandOutput {
            exit_code: Some(0),
            output: output.as_bytes().to_vec(),
        })
    }

    /// Every run exits with `exit_code` and `output`
    pub fn failing(exit_code: i32, output: &str) -> Self {
        Self::with_result(CommandOutput {
            exit_code: Some(exit_code),
            output: output.as_bytes().to_vec(),
        })
    }

    fn with_result(result: CommandOutput) -> Self {
        Self {
            result,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `(program, args)` of every run, in order
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, PopulatorError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        Ok(self.result.clone())
    }
}
