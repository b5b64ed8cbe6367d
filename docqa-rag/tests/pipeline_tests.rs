//! End-to-end tests for indexing a document set and answering questions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa_rag::{
    Chunker, EmbeddingProvider, ExtractiveGenerationProvider, GenerationProvider,
    HashingEmbeddingProvider, IndexBuilder, Ingestor, RagConfig, RagError, RagPipeline,
    RawDocument, RecursiveChunker, Result, Retriever, RetryConfig, SourceDocument,
};

const SENTINEL: &str = "Candidate not found in uploaded resumes.";

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig { max_attempts, initial_backoff_ms: 1, backoff_multiplier: 2.0, max_backoff_ms: 2 }
}

fn resumes() -> Vec<SourceDocument> {
    vec![
        SourceDocument::new("alice.pdf", vec!["Alice: 5 years Java".to_string()]),
        SourceDocument::new("bob.pdf", vec!["Bob: 2 years Python".to_string()]),
    ]
}

fn hashing() -> Arc<HashingEmbeddingProvider> {
    Arc::new(HashingEmbeddingProvider::new(1024).unwrap())
}

fn pipeline_with(
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
) -> RagPipeline {
    RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .generation_provider(generator)
        .build()
        .unwrap()
}

/// Records every prompt and temperature it receives and replies with a fixed text.
struct RecordingGenerator {
    reply: String,
    calls: Mutex<Vec<(String, f32)>>,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), calls: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> Vec<(String, f32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.calls.lock().unwrap().push((prompt.to_string(), temperature));
        Ok(self.reply.clone())
    }

    fn model_id(&self) -> &str {
        "recording"
    }
}

struct FailingGenerator {
    attempts: AtomicUsize,
}

#[async_trait]
impl GenerationProvider for FailingGenerator {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RagError::GenerationError {
            provider: "failing".to_string(),
            message: "model unavailable".to_string(),
        })
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

/// Refuses to embed any text containing `POISON`.
struct PoisonedEmbedder {
    inner: HashingEmbeddingProvider,
}

#[async_trait]
impl EmbeddingProvider for PoisonedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("POISON") {
            return Err(RagError::EmbeddingError {
                provider: "poisoned".to_string(),
                message: "rejected input".to_string(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Fails the first `failures` calls, then behaves like the wrapped provider.
struct FlakyEmbedder {
    inner: HashingEmbeddingProvider,
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(RagError::EmbeddingError {
                provider: "flaky".to_string(),
                message: "connection reset".to_string(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Returns a shorter vector for texts containing `short`.
struct RaggedEmbedder;

#[async_trait]
impl EmbeddingProvider for RaggedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("short") { Ok(vec![1.0, 0.0]) } else { Ok(vec![1.0, 0.0, 0.0]) }
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_id(&self) -> &str {
        "ragged"
    }
}

/// Returns a two-element vector for texts containing `Alice`, valid vectors otherwise.
struct MalformedFirstEmbedder {
    inner: HashingEmbeddingProvider,
}

#[async_trait]
impl EmbeddingProvider for MalformedFirstEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("Alice") { Ok(vec![1.0, 0.0]) } else { self.inner.embed(text).await }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Refuses every request the way a server without the model does.
struct MissingModelEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for MissingModelEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::from_http_status("Ollama", 404, "model not found".to_string(), |message| {
            RagError::EmbeddingError { provider: "Ollama".to_string(), message }
        }))
    }

    fn dimensions(&self) -> usize {
        64
    }

    fn model_id(&self) -> &str {
        "missing"
    }
}

/// Never reachable; every call fails with a retryable error.
struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "Ollama".to_string(),
            message: "connection refused".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        64
    }

    fn model_id(&self) -> &str {
        "unreachable"
    }
}

#[tokio::test]
async fn java_question_ranks_the_java_resume_first() {
    let pipeline = pipeline_with(
        RagConfig::default(),
        hashing(),
        Arc::new(ExtractiveGenerationProvider::new(SENTINEL)),
    );
    let session = pipeline.index(resumes()).await.unwrap();
    assert_eq!(session.report().documents_indexed, 2);
    assert_eq!(session.report().chunks_indexed, 2);
    assert!(session.report().is_complete());

    let answer = session.answer("Find a Java developer").await.unwrap();
    assert!(answer.generated);
    assert_eq!(answer.sources[0].chunk.document_name, "alice.pdf");
    assert!(answer.sources[0].score > answer.sources[1].score);
    assert!(answer.text.contains("Alice"));
}

#[tokio::test]
async fn prompt_carries_context_in_retrieval_order_at_configured_temperature() {
    let generator = Arc::new(RecordingGenerator::new("Alice"));
    let pipeline = pipeline_with(RagConfig::default(), hashing(), generator.clone());
    let session = pipeline.index(resumes()).await.unwrap();

    session.answer("Find a Java developer").await.unwrap();

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    let (prompt, temperature) = &calls[0];
    assert_eq!(*temperature, 0.0);
    assert!(prompt.contains(SENTINEL));
    assert!(prompt.contains("Question:\nFind a Java developer"));

    let alice = prompt.find("Alice: 5 years Java").unwrap();
    let bob = prompt.find("Bob: 2 years Python").unwrap();
    assert!(alice < bob);
    assert!(prompt.contains("Alice: 5 years Java\n\nBob: 2 years Python"));
}

#[tokio::test]
async fn empty_index_answers_with_sentinel_without_calling_the_model() {
    let generator = Arc::new(RecordingGenerator::new("should not be used"));
    let pipeline = pipeline_with(RagConfig::default(), hashing(), generator.clone());
    let session = pipeline.index(Vec::new()).await.unwrap();

    assert_eq!(session.report().chunks_indexed, 0);
    let answer = session.answer("Find a Java developer").await.unwrap();
    assert_eq!(answer.text, SENTINEL);
    assert!(!answer.generated);
    assert!(answer.sources.is_empty());
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn empty_context_reaches_the_model_when_short_circuit_is_off() {
    let config = RagConfig::builder().short_circuit_empty_context(false).build().unwrap();
    let generator = Arc::new(RecordingGenerator::new(SENTINEL));
    let pipeline = pipeline_with(config, hashing(), generator.clone());
    let session = pipeline.index(Vec::new()).await.unwrap();

    let answer = session.answer("Find a Java developer").await.unwrap();
    assert!(answer.generated);
    assert_eq!(answer.text, SENTINEL);
    assert!(generator.calls()[0].0.contains("Context:\n\n\nQuestion:"));
}

#[tokio::test]
async fn unrelated_question_falls_below_similarity_threshold() {
    let config = RagConfig::builder().similarity_threshold(0.1).build().unwrap();
    let generator = Arc::new(RecordingGenerator::new("hallucinated"));
    let pipeline = pipeline_with(config, hashing(), generator.clone());
    let session = pipeline.index(resumes()).await.unwrap();

    let answer = session.answer("Who knows Haskell?").await.unwrap();
    assert_eq!(answer.text, SENTINEL);
    assert!(!answer.generated);
    assert!(generator.calls().is_empty());

    let answer = session.answer("Find a Java developer").await.unwrap();
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].chunk.document_name, "alice.pdf");
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let pipeline = pipeline_with(
        RagConfig::default(),
        hashing(),
        Arc::new(ExtractiveGenerationProvider::new(SENTINEL)),
    );
    let session = pipeline.index(resumes()).await.unwrap();
    let err = session.answer("   ").await.unwrap_err();
    assert!(matches!(err, RagError::PipelineError(_)));
}

#[tokio::test]
async fn identical_inputs_build_identical_indexes() {
    let pipeline = pipeline_with(
        RagConfig::default(),
        hashing(),
        Arc::new(ExtractiveGenerationProvider::new(SENTINEL)),
    );
    let first = pipeline.index(resumes()).await.unwrap();
    let second = pipeline.index(resumes()).await.unwrap();

    let a = first.indexed_vectors().await;
    assert_eq!(a.len(), 2);
    assert_eq!(a, second.indexed_vectors().await);
    assert_eq!(a[0].chunk.id, "alice.pdf_0_0");
}

#[tokio::test]
async fn sessions_do_not_share_an_index() {
    let pipeline = pipeline_with(
        RagConfig::default(),
        hashing(),
        Arc::new(ExtractiveGenerationProvider::new(SENTINEL)),
    );
    let java = pipeline.index(resumes()).await.unwrap();
    let empty = pipeline.index(Vec::new()).await.unwrap();

    assert_eq!(java.indexed_vectors().await.len(), 2);
    assert!(empty.indexed_vectors().await.is_empty());
    assert!(!empty.answer("Find a Java developer").await.unwrap().generated);
}

#[tokio::test]
async fn unreadable_documents_are_skipped_and_reported() {
    let pipeline = pipeline_with(
        RagConfig::default(),
        hashing(),
        Arc::new(ExtractiveGenerationProvider::new(SENTINEL)),
    );
    let raw = vec![
        RawDocument::new("scan.pdf", b"%PDF-1.4 binary".to_vec()),
        RawDocument::new("blank.txt", b"  \n ".to_vec()),
        RawDocument::new("alice.txt", b"Alice: 5 years Java".to_vec()),
    ];

    let session = pipeline.index_raw(raw, &Ingestor::default()).await.unwrap();
    let report = session.report();
    assert_eq!(report.documents_indexed, 1);
    assert_eq!(report.chunks_indexed, 1);
    let skipped: Vec<_> = report.skipped.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skipped, vec!["scan.pdf", "blank.txt"]);
    assert!(!report.is_complete());

    let answer = session.answer("Find a Java developer").await.unwrap();
    assert_eq!(answer.text, "Alice: 5 years Java");
}

#[tokio::test]
async fn chunks_that_fail_to_embed_are_dropped_not_fatal() {
    let config = RagConfig::builder().retry(fast_retry(2)).build().unwrap();
    let embedder =
        Arc::new(PoisonedEmbedder { inner: HashingEmbeddingProvider::new(1024).unwrap() });
    let pipeline =
        pipeline_with(config, embedder, Arc::new(ExtractiveGenerationProvider::new(SENTINEL)));

    let mut documents = resumes();
    documents.insert(1, SourceDocument::new("bad.pdf", vec!["POISON payload".to_string()]));
    let session = pipeline.index(documents).await.unwrap();

    let report = session.report();
    assert_eq!(report.documents_indexed, 3);
    assert_eq!(report.chunks_indexed, 2);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].chunk_id, "bad.pdf_0_0");
    assert!(report.dropped[0].reason.contains("rejected input"));

    let ids: Vec<_> =
        session.indexed_vectors().await.into_iter().map(|v| v.chunk.id).collect();
    assert_eq!(ids, vec!["alice.pdf_0_0", "bob.pdf_0_0"]);
}

#[tokio::test]
async fn transient_embedding_failures_are_retried() {
    let config = RagConfig::builder().retry(fast_retry(3)).build().unwrap();
    let embedder = Arc::new(FlakyEmbedder {
        inner: HashingEmbeddingProvider::new(1024).unwrap(),
        failures: 2,
        calls: AtomicUsize::new(0),
    });
    let pipeline = pipeline_with(
        config,
        embedder.clone(),
        Arc::new(ExtractiveGenerationProvider::new(SENTINEL)),
    );

    let session = pipeline.index(resumes()).await.unwrap();
    assert!(session.report().is_complete());
    assert_eq!(session.report().chunks_indexed, 2);
    assert!(embedder.calls.load(Ordering::SeqCst) >= 4);
}

#[tokio::test]
async fn vectors_of_the_wrong_size_are_dropped() {
    let config = RagConfig::default();
    let chunker = RecursiveChunker::new(config.chunk_size, config.chunk_overlap).unwrap();
    let chunks = chunker.split(
        &[
            SourceDocument::new("a.txt", vec!["long enough".to_string()]),
            SourceDocument::new("b.txt", vec!["short".to_string()]),
        ]
        .iter()
        .flat_map(SourceDocument::units)
        .collect::<Vec<_>>(),
    );

    let built = IndexBuilder::new(Arc::new(RaggedEmbedder), &config).build(chunks).await.unwrap();
    assert_eq!(built.dropped.len(), 1);
    assert_eq!(built.dropped[0].document_name, "b.txt");
    assert!(built.dropped[0].reason.contains("dimension"));
}

#[tokio::test]
async fn malformed_first_vector_does_not_fix_the_dimension() {
    let embedder = Arc::new(MalformedFirstEmbedder {
        inner: HashingEmbeddingProvider::new(64).unwrap(),
    });
    let pipeline =
        pipeline_with(RagConfig::default(), embedder, Arc::new(RecordingGenerator::new("ok")));
    let mut documents = resumes();
    documents.push(SourceDocument::new("carol.pdf", vec!["Carol: 7 years Java".to_string()]));

    let session = pipeline.index(documents).await.unwrap();
    let report = session.report();
    assert_eq!(report.chunks_indexed, 2);
    let dropped: Vec<_> = report.dropped.iter().map(|d| d.chunk_id.as_str()).collect();
    assert_eq!(dropped, vec!["alice.pdf_0_0"]);
    assert!(report.dropped[0].reason.contains("64"));

    let answer = session.answer("Find a Java developer").await.unwrap();
    assert_eq!(answer.sources[0].chunk.document_name, "carol.pdf");
}

#[tokio::test]
async fn index_fails_when_no_chunk_can_be_embedded() {
    let config = RagConfig::builder().retry(fast_retry(2)).build().unwrap();
    let pipeline = pipeline_with(
        config,
        Arc::new(UnreachableEmbedder),
        Arc::new(RecordingGenerator::new("should not be used")),
    );

    let err = pipeline.index(resumes()).await.unwrap_err();
    match err {
        RagError::EmbeddingError { message, .. } => {
            assert!(message.contains("none of the 2 chunks"));
            assert!(message.contains("connection refused"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // No chunks at all is still a valid, empty index.
    assert!(pipeline.index(Vec::new()).await.is_ok());
}

#[tokio::test]
async fn refused_requests_are_not_retried() {
    let config = RagConfig::builder().retry(fast_retry(3)).build().unwrap();
    let embedder = Arc::new(MissingModelEmbedder { calls: AtomicUsize::new(0) });
    let pipeline = pipeline_with(
        config,
        embedder.clone(),
        Arc::new(RecordingGenerator::new("should not be used")),
    );

    let err = pipeline.index(resumes()).await.unwrap_err();
    assert!(err.to_string().contains("HTTP 404"));
    // The batch stops at its first refusal, then each chunk is tried once.
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn generation_failure_propagates_after_retries() {
    let config = RagConfig::builder().retry(fast_retry(2)).build().unwrap();
    let generator = Arc::new(FailingGenerator { attempts: AtomicUsize::new(0) });
    let pipeline = pipeline_with(config, hashing(), generator.clone());
    let session = pipeline.index(resumes()).await.unwrap();

    let err = session.answer("Find a Java developer").await.unwrap_err();
    assert!(matches!(err, RagError::GenerationError { .. }));
    assert_eq!(generator.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retriever_rejects_a_different_embedding_model() {
    let chunks = RecursiveChunker::new(100, 10).unwrap().split(&resumes()[0].units());
    let embedder = Arc::new(HashingEmbeddingProvider::new(64).unwrap());
    let built = IndexBuilder::new(embedder, &RagConfig::default()).build(chunks).await.unwrap();

    let err =
        Retriever::new(built.store, Arc::new(HashingEmbeddingProvider::new(128).unwrap()), 5)
            .unwrap_err();
    match err {
        RagError::EmbeddingModelMismatch { index, provider } => {
            assert_eq!(index, "hashing-bow-64");
            assert_eq!(provider, "hashing-bow-128");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn builder_requires_providers() {
    let err = RagPipeline::builder().config(RagConfig::default()).build().unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));

    let err = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(hashing())
        .build()
        .unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));

    let pipeline = pipeline_with(
        RagConfig::default(),
        hashing(),
        Arc::new(ExtractiveGenerationProvider::new(SENTINEL)),
    );
    let debug = format!("{pipeline:?}");
    assert!(debug.contains("hashing-bow-1024"));
    assert!(debug.contains("extractive"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_questions_share_one_session() {
    let pipeline = pipeline_with(
        RagConfig::default(),
        hashing(),
        Arc::new(ExtractiveGenerationProvider::new(SENTINEL)),
    );
    let session = Arc::new(pipeline.index(resumes()).await.unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let question =
                    if i % 2 == 0 { "Find a Java developer" } else { "Who writes Python?" };
                session.answer(question).await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let answer = handle.await.unwrap().unwrap();
        let expected = if i % 2 == 0 { "alice.pdf" } else { "bob.pdf" };
        assert_eq!(answer.sources[0].chunk.document_name, expected);
    }
}

/// Follows the grounding instruction: answers only when the context names the skill.
struct ContractFollowingGenerator {
    skill: &'static str,
}

#[async_trait]
impl GenerationProvider for ContractFollowingGenerator {
    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String> {
        let context = prompt
            .split_once("Context:\n")
            .and_then(|(_, rest)| rest.split_once("\n\nQuestion:\n"))
            .map(|(context, _)| context)
            .unwrap_or_default();
        if context.contains(self.skill) {
            Ok(format!("A {} developer is in the context.", self.skill))
        } else {
            Ok(SENTINEL.to_string())
        }
    }

    fn model_id(&self) -> &str {
        "contract-following"
    }
}

// Grounding is an instruction to the model. This checks the pipeline hands a
// contract-following model what it needs to refuse, not that real models comply.
#[tokio::test]
async fn unsupported_question_yields_sentinel_from_a_grounded_model() {
    let pipeline = pipeline_with(
        RagConfig::default(),
        hashing(),
        Arc::new(ContractFollowingGenerator { skill: "Rust" }),
    );
    let session = pipeline.index(resumes()).await.unwrap();

    let answer = session.answer("Find a Rust developer").await.unwrap();
    assert!(answer.generated);
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.text, SENTINEL);
}
