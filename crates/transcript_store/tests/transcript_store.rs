use std::fs;

use pretty_assertions::assert_eq;
use serde_json::json;
use stream_formatter::{ConversationTurn, Role};
use time::macros::datetime;
use transcript_store::{
    export_markdown, export_markdown_at, render_markdown, ConversationSnapshot, TranscriptError,
    EXPORT_DIR,
};

fn history() -> Vec<ConversationTurn> {
    vec![
        ConversationTurn::user("Draw the flow"),
        ConversationTurn::assistant("<think>Two steps.</think><output>A then B</output>"),
        ConversationTurn::user("Thanks"),
        ConversationTurn::assistant("plain reply"),
    ]
}

#[test]
fn markdown_document_splits_assistant_sections() {
    let document = render_markdown(
        "deepseek-r1:8b",
        &history(),
        datetime!(2026-02-14 08:30:00 UTC),
    )
    .expect("document should render");

    assert_eq!(
        document,
        "# Chat History - 2026-02-14 08:30:00\n\n\
         Model: deepseek-r1:8b\n\n\
         ## User Input\nDraw the flow\n\n---\n\n\
         ## Assistant Response\n### Thinking Process\nTwo steps.\n\n### Output\nA then B\n\n---\n\n\
         ## User Input\nThanks\n\n---\n\n\
         ## Assistant Response\nplain reply\n\n---\n\n"
    );
}

#[test]
fn export_writes_timestamped_file_under_conversations() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let at = datetime!(2026-02-14 08:30:05 UTC);

    let path = export_markdown_at(dir.path(), "llama2", &history(), at)
        .expect("export should succeed")
        .expect("non-empty history should produce a file");

    assert_eq!(
        path,
        dir.path().join(EXPORT_DIR).join("chat_20260214_083005.md")
    );
    let written = fs::read_to_string(&path).expect("export should be readable");
    assert!(written.starts_with("# Chat History - 2026-02-14 08:30:05\n\nModel: llama2\n\n"));
}

#[test]
fn empty_history_export_is_a_no_op() {
    let dir = tempfile::tempdir().expect("tempdir should be created");

    let exported = export_markdown(dir.path(), "llama2", &[]).expect("no-op should succeed");
    assert_eq!(exported, None);
    assert!(!dir.path().join(EXPORT_DIR).exists());
}

#[test]
fn snapshot_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("nested").join("chat.json");
    let snapshot = ConversationSnapshot::new("mistral", history());

    snapshot.save(&path).expect("save should succeed");
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("saved file should be readable"))
            .expect("saved file should be JSON");
    assert_eq!(raw["model"], json!("mistral"));
    assert_eq!(raw["history"][1]["role"], json!("assistant"));

    let loaded = ConversationSnapshot::load(&path).expect("load should succeed");
    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.history[0].role, Role::User);
}

#[test]
fn load_rejects_unknown_roles() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("chat.json");
    fs::write(
        &path,
        json!({"model": "llama2", "history": [{"role": "system", "content": "x"}]}).to_string(),
    )
    .expect("fixture should be written");

    let error = ConversationSnapshot::load(&path).expect_err("unknown role must fail");
    assert!(matches!(error, TranscriptError::JsonParse { .. }));
    assert!(error.to_string().contains("chat.json"));
}

#[test]
fn load_rejects_blank_model_and_missing_files() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("chat.json");
    fs::write(&path, json!({"model": " ", "history": []}).to_string())
        .expect("fixture should be written");

    assert!(matches!(
        ConversationSnapshot::load(&path),
        Err(TranscriptError::MissingModel { .. })
    ));
    assert!(matches!(
        ConversationSnapshot::load(&dir.path().join("absent.json")),
        Err(TranscriptError::Io { .. })
    ));
}
