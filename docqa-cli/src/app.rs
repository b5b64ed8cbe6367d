use std::fmt::Write as _;

use docqa_rag::{Answer, BuildReport, Ingestor, RagPipeline, Session, SkippedDocument};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::args::Cli;
use crate::files::{collect_files, read_documents};
use crate::providers::build_providers;

const SNIPPET_CHARS: usize = 80;

/// How answers are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub show_sources: bool,
}

impl Output {
    pub fn render(&self, answer: &Answer) -> anyhow::Result<String> {
        if self.json {
            return Ok(serde_json::to_string_pretty(answer)?);
        }
        let mut out = answer.text.trim().to_string();
        if self.show_sources && !answer.sources.is_empty() {
            out.push_str("\n\nSources:");
            for (i, source) in answer.sources.iter().enumerate() {
                let _ = write!(
                    out,
                    "\n  [{}] {} p.{} ({:.3}): {}",
                    i + 1,
                    source.chunk.document_name,
                    source.chunk.page_index + 1,
                    source.score,
                    snippet(&source.chunk.text),
                );
            }
        }
        Ok(out)
    }
}

fn snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SNIPPET_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(SNIPPET_CHARS).collect();
    format!("{cut}...")
}

/// Summarise an index build, including files that could not be read at all.
pub fn render_report(report: &BuildReport, unreadable: &[SkippedDocument]) -> String {
    let mut out = format!(
        "Indexed {} document(s) into {} chunk(s).",
        report.documents_indexed, report.chunks_indexed
    );
    for skipped in unreadable.iter().chain(&report.skipped) {
        let _ = write!(out, "\n  skipped {}: {}", skipped.name, skipped.reason);
    }
    if !report.dropped.is_empty() {
        let _ = write!(
            out,
            "\n  {} chunk(s) could not be embedded and are missing from the index",
            report.dropped.len()
        );
        for dropped in &report.dropped {
            let _ = write!(out, "\n    {}: {}", dropped.chunk_id, dropped.reason);
        }
    }
    out
}

/// Build the pipeline for `cli` and index the files it names.
///
/// Returns the session together with the files that could not be read at all;
/// documents the extractor rejects are listed in the session's report.
pub async fn open_session(cli: &Cli) -> anyhow::Result<(Session, Vec<SkippedDocument>)> {
    let config = cli.rag_config()?;
    let providers = build_providers(cli.backend, &config, cli.base_url.as_deref())?;
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(providers.embedding)
        .generation_provider(providers.generation)
        .build()?;

    let files = collect_files(&cli.paths)?;
    let (documents, unreadable) = read_documents(&files);
    let session = pipeline.index_raw(documents, &Ingestor::default()).await?;
    Ok((session, unreadable))
}

/// Index the files named on the command line, then answer questions.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let (session, unreadable) = open_session(&cli).await?;
    eprintln!("{}", render_report(session.report(), &unreadable));

    let output = Output { json: cli.json, show_sources: cli.show_sources };
    match &cli.question {
        Some(question) => {
            let answer = session.answer(question).await?;
            println!("{}", output.render(&answer)?);
            Ok(())
        }
        None => repl(&session, output).await,
    }
}

/// Read questions until `exit`, `quit`, Ctrl-C or Ctrl-D.
pub async fn repl(session: &Session, output: Output) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    eprintln!("Ask a question about the documents. Type 'exit' to quit.");
    loop {
        match editor.readline("question> ") {
            Ok(line) => {
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if matches!(question, "exit" | "quit") {
                    break;
                }
                let _ = editor.add_history_entry(question);
                match session.answer(question).await {
                    Ok(answer) => println!("{}\n", output.render(&answer)?),
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
