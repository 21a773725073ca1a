use std::io::Write;
use tokio::time::Duration;

use answer_reveal::app::transcript::read_transcript;
use answer_reveal::session::events::Rating;
use answer_reveal::session::OutgoingMessage;
use answer_reveal::{Application, ChunkPolicy, Config, ReplayOptions};

fn write_transcript(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    for line in lines {
        writeln!(file, "{line}").expect("write transcript line");
    }
    file
}

fn options() -> ReplayOptions {
    ReplayOptions {
        settle: Duration::from_secs(2),
        ..ReplayOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn agent_answer_supersedes_direct_and_lands_on_thread() {
    let file = write_transcript(&[
        r#"{"at_ms": 0, "event": {"kind": "submit", "query": "  Which RRC states exist?  "}}"#,
        r#"{"at_ms": 5, "event": {"kind": "agent", "payload": {"type": "logs", "response": "Checking **38.331**"}}}"#,
        r#"{"at_ms": 6, "event": {"kind": "agent", "payload": {"type": "results", "columns": ["state", 7, ""], "rows": [["IDLE"]]}}}"#,
        r#"{"at_ms": 8, "event": {"kind": "main", "payload": {"type": "graph", "response": "{\"nodes\": []}"}}}"#,
        r#"{"at_ms": 9, "event": {"kind": "main", "payload": {"type": "questions", "response": ["What about INACTIVE?"]}}}"#,
    ]);

    let entries = read_transcript(Some(file.path())).await.unwrap();
    let mut app = Application::new(&Config::default());
    let report = app.replay(entries, options(), None).await.unwrap();

    assert_eq!(report.active_source, "agent");
    assert_eq!(report.agent_text, "Checking <b>38.331</b>");
    assert!(report.direct_text.is_empty());
    // The agent path has no completion signal, so nothing is committed to the thread.
    assert!(!report.answer_complete);
    assert!(report.completed.is_empty());

    assert_eq!(report.threads.len(), 1);
    assert_eq!(report.threads[0].title, "Which RRC states exist?");
    assert_eq!(report.messages.len(), 1);
    assert_eq!(report.results.as_ref().unwrap().columns, vec!["state"]);
    assert!(report.graph.is_some());
    assert!(report.suggested_questions.is_some());

    match &report.outgoing[0] {
        OutgoingMessage::Query(request) => {
            assert_eq!(request.query, "Which RRC states exist?");
            assert!(request.history.is_empty());
        }
        other => panic!("expected query, got {other:?}"),
    }
    app.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn events_after_abort_are_ignored() {
    let file = write_transcript(&[
        r#"{"at_ms": 0, "event": {"kind": "submit", "query": "first"}}"#,
        r#"{"at_ms": 2, "event": {"kind": "abort"}}"#,
        r#"{"at_ms": 4, "event": {"kind": "main", "payload": {"type": "response", "response": "too late"}}}"#,
        r#"{"at_ms": 6, "event": {"kind": "submit", "query": "second"}}"#,
        r#"{"at_ms": 8, "event": {"kind": "main", "payload": {"type": "response", "response": "on **time**"}}}"#,
    ]);

    let entries = read_transcript(Some(file.path())).await.unwrap();
    let mut app = Application::new(&Config::default());
    let report = app.replay(entries, options(), None).await.unwrap();

    assert!(report.answer_complete);
    assert_eq!(report.direct_text, "on <b>time</b>");
    assert_eq!(report.completed.len(), 1);
    // The thread keeps the raw markdown; only the display carries markup.
    assert_eq!(report.completed[0].content, "on **time**");

    let kinds: Vec<&str> = report
        .outgoing
        .iter()
        .map(|message| match message {
            OutgoingMessage::Query(_) => "query",
            OutgoingMessage::Abort(_) => "abort",
            OutgoingMessage::DeleteThread { .. } => "delete",
            OutgoingMessage::Feedback(_) => "feedback",
        })
        .collect();
    assert_eq!(kinds, vec!["query", "abort", "query"]);

    // Both prompts share one thread; the second carries the first as history.
    match &report.outgoing[2] {
        OutgoingMessage::Query(request) => assert_eq!(request.history.len(), 1),
        other => panic!("expected query, got {other:?}"),
    }
    assert_eq!(report.messages.len(), 3);
    app.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn carry_chunking_joins_markup_across_chunks() {
    let file = write_transcript(&[
        r#"{"at_ms": 0, "event": {"kind": "submit", "query": "q"}}"#,
        r#"{"at_ms": 1, "event": {"kind": "agent", "payload": {"type": "logs", "response": "a **b"}}}"#,
        r#"{"at_ms": 2, "event": {"kind": "agent", "payload": {"type": "logs", "response": "** c*"}}}"#,
        r#"{"at_ms": 3, "event": {"kind": "finish_agent_stream"}}"#,
    ]);

    let mut config = Config::default();
    config.reveal.chunking = ChunkPolicy::Carry;
    let entries = read_transcript(Some(file.path())).await.unwrap();
    let mut app = Application::new(&config);
    let report = app.replay(entries, options(), None).await.unwrap();

    assert_eq!(report.agent_text, "a <b>b</b> c<br/>");
    app.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn new_chat_clears_visible_answer() {
    let file = write_transcript(&[
        r#"{"at_ms": 0, "event": {"kind": "submit", "query": "q"}}"#,
        r#"{"at_ms": 1, "event": {"kind": "main", "payload": {"type": "response", "response": "answer"}}}"#,
        r#"{"at_ms": 100, "event": {"kind": "new_chat"}}"#,
    ]);

    let entries = read_transcript(Some(file.path())).await.unwrap();
    let mut app = Application::new(&Config::default());
    let report = app.replay(entries, options(), None).await.unwrap();

    assert_eq!(report.completed.len(), 1);
    assert!(report.direct_text.is_empty());
    assert!(report.messages.is_empty());
    assert_eq!(report.threads.len(), 1);
    app.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn feedback_counts_only_once_the_answer_is_complete() {
    let file = write_transcript(&[
        r#"{"at_ms": 0, "event": {"kind": "submit", "query": "what is RLC?"}}"#,
        r#"{"at_ms": 1, "event": {"kind": "feedback", "rating": "up"}}"#,
        r#"{"at_ms": 2, "event": {"kind": "main", "payload": {"type": "response", "response": "**RLC** segments"}}}"#,
        r#"{"at_ms": 3, "event": {"kind": "feedback", "rating": "up"}}"#,
        r#"{"at_ms": 100, "event": {"kind": "feedback", "rating": "down"}}"#,
    ]);

    let entries = read_transcript(Some(file.path())).await.unwrap();
    let mut app = Application::new(&Config::default());
    let report = app.replay(entries, options(), None).await.unwrap();

    let ratings: Vec<&answer_reveal::session::events::FeedbackRequest> = report
        .outgoing
        .iter()
        .filter_map(|message| match message {
            OutgoingMessage::Feedback(request) => Some(request),
            _ => None,
        })
        .collect();
    // The rating at 3ms lands while the reveal is still running.
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].rating, Rating::Down);
    assert_eq!(ratings[0].prompt, "what is RLC?");
    assert_eq!(ratings[0].answer, "**RLC** segments");
    assert_eq!(ratings[0].source, "main");
    app.shutdown().await.unwrap();
}
