// Shared fixtures for dockerfile-ai integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use lerelais::{
    ConnectivityCause, GenerateRequest, InferenceClient, InferenceConfig, InferenceTransport,
    ModelDescriptor, RelaisError, Result, RetryPolicy,
};
use leportail::{OutputStore, ReviewService};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Analysis the fake model returns for every prompt
pub const ANALYSIS: &str = "The base image is unpinned and apt caches are kept.\n\n\
```dockerfile\nFROM ubuntu:22.04\nRUN apt-get update && apt-get install -y curl \\\n    && rm -rf /var/lib/apt/lists/*\n```\n";

pub const CORRECTED: &str = "FROM ubuntu:22.04\nRUN apt-get update && apt-get install -y curl \\\n    && rm -rf /var/lib/apt/lists/*";

pub const ORIGINAL: &str = "FROM ubuntu:latest\nRUN apt-get update\nRUN apt-get install -y curl\n";

/// How the fake model answers
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Stream this text in two fragments
    Answer(String),
    /// Refuse every connection
    Down,
    /// Answer after a delay
    Slow(Duration, String),
}

/// In-process stand-in for Ollama
pub struct FakeOllama {
    behavior: Behavior,
    calls: AtomicUsize,
    prompts: Mutex<Vec<GenerateRequest>>,
}

impl FakeOllama {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

fn stream(text: &str) -> String {
    let split = text.len() / 2;
    let split = (split..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len());
    let (head, tail) = text.split_at(split);
    format!(
        "{}\n{}\n",
        serde_json::json!({"response": head, "done": false}),
        serde_json::json!({"response": tail, "done": true})
    )
}

#[async_trait]
impl InferenceTransport for FakeOllama {
    fn endpoint(&self) -> String {
        "fake:11434".to_string()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.clone());

        match &self.behavior {
            Behavior::Answer(text) => Ok(stream(text)),
            Behavior::Down => Err(RelaisError::connectivity(
                "Cannot connect to Ollama at fake:11434. Is Ollama running?",
                ConnectivityCause::Refused,
            )),
            Behavior::Slow(delay, text) => {
                tokio::time::sleep(*delay).await;
                Ok(stream(text))
            }
        }
    }

    async fn list_models(&self, _timeout: Duration) -> Result<Vec<ModelDescriptor>> {
        Ok(vec![ModelDescriptor {
            name: "qwen2.5-coder:7b".to_string(),
        }])
    }
}

/// Review service over a fake model and a temporary output directory
pub struct Fixture {
    pub dir: TempDir,
    pub ollama: Arc<FakeOllama>,
    pub service: ReviewService,
}

impl Fixture {
    pub fn new(behavior: Behavior) -> Self {
        let dir = TempDir::new().unwrap();
        let ollama = Arc::new(FakeOllama::new(behavior));
        let policy = RetryPolicy::builder()
            .max_retries(1)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(2))
            .jitter(false)
            .build()
            .unwrap();
        let client = InferenceClient::with_transport(InferenceConfig::default(), ollama.clone())
            .with_policy(policy);
        let service = ReviewService::new(client, OutputStore::new(dir.path().join("output")));
        Self {
            dir,
            ollama,
            service,
        }
    }

    pub fn answering() -> Self {
        Self::new(Behavior::Answer(ANALYSIS.to_string()))
    }

    /// Write a Dockerfile into the temporary directory
    pub fn dockerfile(&self, content: &str) -> PathBuf {
        let path = self.dir.path().join("Dockerfile");
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn output_root(&self) -> &Path {
        self.service.store().root()
    }
}
