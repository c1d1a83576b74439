//! Deterministic stand-ins for the external capabilities, for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::core::errors::ApiError;
use crate::documents::{DocumentSource, SourceDocument};
use crate::llm::{CompletionProvider, CompletionRequest, EmbeddingProvider, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FailureMode {
    None,
    Transient,
    Misconfigured,
}

/// Bag-of-words hashing embedder: texts sharing words get similar vectors.
pub struct FakeEmbeddings {
    dimension: usize,
    mode: Mutex<FailureMode>,
    fail_on_batch: Mutex<Option<usize>>,
    batch_calls: AtomicUsize,
    query_calls: AtomicUsize,
    gate: Mutex<Option<(String, Arc<Semaphore>)>>,
    waiting: AtomicUsize,
}

impl FakeEmbeddings {
    pub fn new() -> Self {
        Self::with_dimension(64)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            mode: Mutex::new(FailureMode::None),
            fail_on_batch: Mutex::new(None),
            batch_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn fail_with_transient(&self) {
        *self.mode.lock().unwrap() = FailureMode::Transient;
    }

    pub fn fail_with_misconfiguration(&self) {
        *self.mode.lock().unwrap() = FailureMode::Misconfigured;
    }

    pub fn recover(&self) {
        *self.mode.lock().unwrap() = FailureMode::None;
    }

    /// Fails only the `n`-th (1-based) batch call counted from now.
    pub fn fail_on_batch(&self, n: usize) {
        let already = self.batch_calls.load(Ordering::SeqCst);
        *self.fail_on_batch.lock().unwrap() = Some(already + n);
    }

    /// Batches containing `marker` block until [`FakeEmbeddings::release`].
    pub fn block_batches_containing(&self, marker: &str) {
        *self.gate.lock().unwrap() = Some((marker.to_string(), Arc::new(Semaphore::new(0))));
    }

    pub fn release(&self) {
        if let Some((_, semaphore)) = self.gate.lock().unwrap().as_ref() {
            semaphore.add_permits(1_000);
        }
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn check_mode(&self) -> Result<(), ProviderError> {
        match *self.mode.lock().unwrap() {
            FailureMode::None => Ok(()),
            FailureMode::Transient => Err(ProviderError::Transient("503 from fake".to_string())),
            FailureMode::Misconfigured => {
                Err(ProviderError::Misconfigured("fake key missing".to_string()))
            }
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let hash = word
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                    (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
                });
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddings {
    fn name(&self) -> &str {
        "fake-embeddings"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let gate = self.gate.lock().unwrap().clone();
        if let Some((marker, semaphore)) = gate {
            if inputs.iter().any(|input| input.contains(&marker)) {
                self.waiting.fetch_add(1, Ordering::SeqCst);
                if let Ok(permit) = semaphore.acquire().await {
                    permit.forget();
                }
                self.waiting.fetch_sub(1, Ordering::SeqCst);
            }
        }

        self.check_mode()?;
        if *self.fail_on_batch.lock().unwrap() == Some(call) {
            return Err(ProviderError::Transient("429 Too Many Requests".to_string()));
        }
        Ok(inputs.iter().map(|input| self.vector_for(input)).collect())
    }

    async fn embed_query(&self, input: &str) -> Result<Vec<f32>, ProviderError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.check_mode()?;
        Ok(self.vector_for(input))
    }
}

/// Returns the same canned vectors for every batch call.
pub struct ScriptedEmbeddings {
    vectors: Vec<Vec<f32>>,
}

impl ScriptedEmbeddings {
    pub fn returning(vectors: Vec<Vec<f32>>) -> Self {
        Self { vectors }
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbeddings {
    fn name(&self) -> &str {
        "scripted-embeddings"
    }

    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(self.vectors.clone())
    }
}

/// Records every request; replies from a script, then with a fixed answer.
pub struct RecordingCompletion {
    requests: Mutex<Vec<CompletionRequest>>,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
}

impl RecordingCompletion {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn then(self, reply: Result<String, ProviderError>) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    fn name(&self) -> &str {
        "recording-completion"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Here is what I found.".to_string()))
    }
}

#[derive(Default)]
pub struct FakeDocuments {
    documents: Mutex<Vec<SourceDocument>>,
    failing: Mutex<bool>,
}

impl FakeDocuments {
    pub fn with(documents: Vec<SourceDocument>) -> Self {
        Self {
            documents: Mutex::new(documents),
            failing: Mutex::new(false),
        }
    }

    pub fn push(&self, document: SourceDocument) {
        self.documents.lock().unwrap().push(document);
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl DocumentSource for FakeDocuments {
    async fn list_all(&self) -> Result<Vec<SourceDocument>, ApiError> {
        if *self.failing.lock().unwrap() {
            return Err(ApiError::Internal("database offline".to_string()));
        }
        Ok(self.documents.lock().unwrap().clone())
    }
}

pub fn document(id: &str, name: &str, folder: Option<&str>, text: &str) -> SourceDocument {
    SourceDocument {
        id: id.to_string(),
        display_name: name.to_string(),
        folder_id: folder.map(str::to_string),
        text: text.to_string(),
    }
}

/// Pads `text` with neutral filler so it clears the minimum-length threshold.
pub fn padded(text: &str) -> String {
    format!("{} {}", text, "lorem ipsum dolor sit amet ".repeat(4))
}
