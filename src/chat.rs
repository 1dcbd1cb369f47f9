//! CLI front ends: `docchat chat`, `docchat ask` and `docchat chunks`.
//!
//! All three load PDFs from the given files or directories. `chat` and
//! `ask` ingest them into a single local session and then answer
//! questions; `chunks` stops after chunking and needs no providers.
//!
//! Answers go to stdout, progress and logs to stderr.

use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use docchat_core::{ConversationTurn, RetrievedChunk};

use crate::config::Config;
use crate::ingest::{load_documents, IngestReport};
use crate::progress::ProgressMode;
use crate::session::{AskResponse, SessionManager};

const CLI_SESSION: &str = "cli";
const PREVIEW_CHARS: usize = 80;

async fn ingest_paths(
    config: &Config,
    paths: &[PathBuf],
    progress: ProgressMode,
) -> Result<(SessionManager, IngestReport)> {
    let documents = load_documents(paths)?;
    let sessions = crate::build_session_manager(config)?.with_progress(Arc::from(progress.reporter()));
    let report = sessions.ingest(CLI_SESSION, documents).await?;
    Ok((sessions, report))
}

/// `docchat ask <paths…> -q <question>…`: ingest, then answer each question
/// in order within one conversation.
pub async fn run_ask(
    config: &Config,
    paths: &[PathBuf],
    questions: &[String],
    progress: ProgressMode,
) -> Result<()> {
    let (sessions, report) = ingest_paths(config, paths, progress).await?;
    print_report(&mut std::io::stdout().lock(), &report)?;

    for question in questions {
        let response = sessions.ask(CLI_SESSION, question).await?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "\n> {}", question)?;
        print_answer(&mut out, &response)?;
    }
    Ok(())
}

/// `docchat chat <paths…>`: ingest, then read questions from stdin until
/// EOF or `/quit`. `/history` prints the conversation so far.
pub async fn run_chat(config: &Config, paths: &[PathBuf], progress: ProgressMode) -> Result<()> {
    let (sessions, report) = ingest_paths(config, paths, progress).await?;
    {
        let mut out = std::io::stdout().lock();
        print_report(&mut out, &report)?;
        writeln!(out, "Ask a question about your documents (/history, /quit).")?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        {
            let mut out = std::io::stdout().lock();
            write!(out, "\n> ")?;
            out.flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                let history = sessions.history(CLI_SESSION).await?;
                print_history(&mut std::io::stdout().lock(), &history)?;
            }
            _ => match sessions.ask(CLI_SESSION, question).await {
                Ok(response) => print_answer(&mut std::io::stdout().lock(), &response)?,
                // A failed question leaves the conversation intact; keep going.
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }
    Ok(())
}

/// `docchat chunks <paths…>`: extract and chunk only.
///
/// Prints one summary line per document followed by chunk previews, or one
/// JSON object per chunk with `--json`.
pub async fn run_chunks(
    config: &Config,
    paths: &[PathBuf],
    json: bool,
    progress: ProgressMode,
) -> Result<()> {
    let pipeline = crate::build_pipeline(config);
    pipeline.chunking().validate()?;
    let documents = load_documents(paths)?;
    let reporter = progress.reporter();
    let texts = pipeline.extract_all(documents, reporter.as_ref()).await?;

    let mut out = std::io::stdout().lock();
    for text in &texts {
        let chunks = pipeline.chunk_all(std::slice::from_ref(text))?;
        if json {
            for chunk in &chunks {
                writeln!(out, "{}", serde_json::to_string(chunk)?)?;
            }
            continue;
        }
        writeln!(
            out,
            "{}  {} pages  {} chars  {} chunks",
            text.document_id,
            text.pages,
            text.text.chars().count(),
            chunks.len()
        )?;
        for chunk in &chunks {
            writeln!(
                out,
                "  #{:<3} [{}..{}]  {}",
                chunk.ordinal,
                chunk.start,
                chunk.end,
                preview(&chunk.text)
            )?;
        }
    }
    Ok(())
}

fn print_report(out: &mut impl Write, report: &IngestReport) -> std::io::Result<()> {
    writeln!(
        out,
        "Indexed {} documents ({} pages) into {} chunks with {}.",
        report.documents, report.pages, report.chunks, report.model_id
    )?;
    for skipped in &report.skipped_pages {
        writeln!(
            out,
            "  skipped pages {:?} of {}",
            skipped.pages, skipped.document_id
        )?;
    }
    Ok(())
}

fn print_answer(out: &mut impl Write, response: &AskResponse) -> std::io::Result<()> {
    writeln!(out, "{}", response.answer.trim())?;
    if !response.sources.is_empty() {
        writeln!(out, "\nSources:")?;
        for (i, source) in response.sources.iter().enumerate() {
            print_source(out, i + 1, source)?;
        }
    }
    Ok(())
}

fn print_source(out: &mut impl Write, n: usize, source: &RetrievedChunk) -> std::io::Result<()> {
    writeln!(
        out,
        "  [{}] {} #{} ({:.3})  {}",
        n,
        source.chunk.document_id,
        source.chunk.ordinal,
        source.score,
        preview(&source.chunk.text)
    )
}

fn print_history(out: &mut impl Write, history: &[ConversationTurn]) -> std::io::Result<()> {
    for turn in history {
        writeln!(
            out,
            "[{}] {}: {}",
            turn.timestamp.format("%H:%M:%S"),
            turn.role.as_str(),
            turn.content
        )?;
    }
    Ok(())
}

/// First line of `text`, cut to a fixed number of characters.
fn preview(text: &str) -> String {
    let line = text.trim().lines().next().unwrap_or("");
    let mut preview: String = line.chars().take(PREVIEW_CHARS).collect();
    if line.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::Chunk;

    #[test]
    fn preview_cuts_long_first_lines() {
        assert_eq!(preview("  short\nsecond"), "short");
        let long = "é".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 1);
        assert!(p.ends_with('…'));
    }

    #[test]
    fn answer_lists_sources() {
        let response = AskResponse {
            answer: "Tuition is due in March.\n".to_string(),
            history: Vec::new(),
            sources: vec![RetrievedChunk {
                chunk: Chunk {
                    id: "c".to_string(),
                    document_id: "handbook.pdf".to_string(),
                    ordinal: 2,
                    text: "Tuition fees are due in March.".to_string(),
                    start: 0,
                    end: 30,
                    hash: "h".to_string(),
                },
                score: 0.75,
            }],
        };
        let mut buf = Vec::new();
        print_answer(&mut buf, &response).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Tuition is due in March.\n"));
        assert!(text.contains("[1] handbook.pdf #2 (0.750)  Tuition fees are due in March."));
    }

    #[test]
    fn history_prints_roles_in_order() {
        let history = vec![ConversationTurn::user("Q1"), ConversationTurn::assistant("A1")];
        let mut buf = Vec::new();
        print_history(&mut buf, &history).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let user = text.find("user: Q1").unwrap();
        let assistant = text.find("assistant: A1").unwrap();
        assert!(user < assistant);
    }
}
