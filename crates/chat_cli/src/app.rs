use std::path::{Path, PathBuf};

use stream_formatter::config::MODEL_LIST;
use stream_formatter::{
    build_prompt, split_sections, ConversationTurn, FormatRequest, RequestId, StreamEvent,
};
use transcript_store::ConversationSnapshot;

use crate::commands::{parse_slash_command, SlashCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Streaming { request_id: RequestId },
    Error(String),
    Exiting,
}

/// One unit of terminal output produced by the app, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Newly arrived reasoning text, printed to stderr without a newline.
    Reasoning(String),
    /// Newly arrived raw stream text, printed to stdout without a newline.
    Raw(String),
    /// Final answer text for a completed request.
    Answer(String),
    /// Status line for the user, printed to stderr.
    Notice(String),
}

/// Side effects the app asks its host to perform.
pub trait HostOps {
    fn submit(&mut self, request: FormatRequest) -> Result<RequestId, String>;
    fn cancel(&mut self) -> Option<RequestId>;
    fn save(&mut self, path: &Path, snapshot: &ConversationSnapshot) -> Result<(), String>;
    fn load(&mut self, path: &Path) -> Result<ConversationSnapshot, String>;
    fn export(
        &mut self,
        model: &str,
        history: &[ConversationTurn],
    ) -> Result<Option<PathBuf>, String>;
    fn write_document(&mut self, answer_html: &str);
}

const HELP_TEXT: &str = "Commands: /help, /clear, /cancel, /model <name>, /models, /save [path], /export, /load [path], /quit";
pub const DEFAULT_SNAPSHOT_FILE: &str = "conversation.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub mode: Mode,
    pub model: String,
    history: Vec<ConversationTurn>,
    reasoning: String,
    raw: String,
    answer_html: String,
    show_raw: bool,
    exit_when_idle: bool,
    output: Vec<Output>,
    pub should_exit: bool,
}

impl App {
    pub fn new(model: impl Into<String>, show_raw: bool) -> Self {
        Self {
            mode: Mode::Idle,
            model: model.into(),
            history: Vec::new(),
            reasoning: String::new(),
            raw: String::new(),
            answer_html: String::new(),
            show_raw,
            exit_when_idle: false,
            output: Vec::new(),
            should_exit: false,
        }
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Latest answer markup of the active or most recent request.
    pub fn answer_html(&self) -> &str {
        &self.answer_html
    }

    pub fn drain_output(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.output)
    }

    pub fn on_line(&mut self, line: &str, host: &mut dyn HostOps) {
        if let Some(command) = parse_slash_command(line) {
            self.on_command(command, host);
            return;
        }

        let text = line.trim();
        if text.is_empty() {
            return;
        }

        // History as of before this turn, the user text goes in separately.
        let prompt = build_prompt(&self.history, text);
        match host.submit(FormatRequest::new(self.model.clone(), prompt)) {
            Ok(request_id) => {
                self.history.push(ConversationTurn::user(text));
                self.reset_stream_view();
                self.mode = Mode::Streaming { request_id };
            }
            Err(error) => {
                self.mode = Mode::Error(error.clone());
                self.push_notice(format!("Failed to start request: {error}"));
            }
        }
    }

    /// End of input: exit now, or once the active request settles.
    pub fn on_input_closed(&mut self) {
        if self.active_request().is_some() {
            self.exit_when_idle = true;
        } else {
            self.exit();
        }
    }

    pub fn on_event(&mut self, event: StreamEvent, host: &mut dyn HostOps) {
        if !self.is_active_request(event.request_id()) {
            return;
        }

        match event {
            StreamEvent::ReasoningUpdated { text, .. } => {
                let delta = appended_text(&self.reasoning, &text);
                if !delta.is_empty() {
                    self.output.push(Output::Reasoning(delta.to_string()));
                }
                self.reasoning = text;
            }
            StreamEvent::AnswerUpdated { html, .. } => {
                host.write_document(&html);
                self.answer_html = html;
            }
            StreamEvent::RawUpdated { text, .. } => {
                if self.show_raw {
                    let delta = appended_text(&self.raw, &text);
                    if !delta.is_empty() {
                        self.output.push(Output::Raw(delta.to_string()));
                    }
                }
                self.raw = text;
            }
            StreamEvent::Error { message, .. } => {
                self.finish_reasoning_line();
                self.push_notice(format!("Request failed: {message}"));
                self.mode = Mode::Error(message);
                self.settle();
            }
            StreamEvent::Completed { response, .. } => {
                self.finish_reasoning_line();
                let sections = split_sections(&response);
                // Untagged replies are shown as-is.
                let shown = if sections.is_empty() {
                    response.trim()
                } else {
                    sections.answer.trim()
                };
                if !shown.is_empty() {
                    self.output.push(Output::Answer(shown.to_string()));
                }
                self.history.push(ConversationTurn::assistant(response));
                self.mode = Mode::Idle;
                self.settle();
            }
        }
    }

    pub fn active_request(&self) -> Option<RequestId> {
        match self.mode {
            Mode::Streaming { request_id } => Some(request_id),
            _ => None,
        }
    }

    fn on_command(&mut self, command: SlashCommand, host: &mut dyn HostOps) {
        match command {
            SlashCommand::Help => self.push_notice(HELP_TEXT),
            SlashCommand::Clear => {
                if self.active_request().is_some() {
                    host.cancel();
                }
                self.history.clear();
                self.reset_stream_view();
                self.mode = Mode::Idle;
                self.push_notice("Conversation cleared");
            }
            SlashCommand::Cancel => self.on_cancel(host),
            SlashCommand::Model(None) => {
                self.push_notice(format!("Current model: {}", self.model));
            }
            SlashCommand::Model(Some(model)) => {
                if !MODEL_LIST.contains(&model.as_str()) {
                    self.push_notice(format!("Note: {model} is not in the model list"));
                }
                self.push_notice(format!("Model set to {model}"));
                self.model = model;
            }
            SlashCommand::Models => {
                let listing = MODEL_LIST
                    .iter()
                    .map(|name| {
                        let marker = if *name == self.model { "*" } else { " " };
                        format!("{marker} {name}")
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                self.push_notice(listing);
            }
            SlashCommand::Save(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_FILE));
                let snapshot = ConversationSnapshot::new(self.model.clone(), self.history.clone());
                match host.save(&path, &snapshot) {
                    Ok(()) => self.push_notice(format!("Saved conversation to {}", path.display())),
                    Err(error) => self.push_notice(format!("Save failed: {error}")),
                }
            }
            SlashCommand::Export => match host.export(&self.model, &self.history) {
                Ok(Some(path)) => self.push_notice(format!("Exported to {}", path.display())),
                Ok(None) => self.push_notice("Nothing to export"),
                Err(error) => self.push_notice(format!("Export failed: {error}")),
            },
            SlashCommand::Load(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_FILE));
                match host.load(&path) {
                    Ok(snapshot) => {
                        if self.active_request().is_some() {
                            host.cancel();
                        }
                        self.model = snapshot.model;
                        self.history = snapshot.history;
                        self.reset_stream_view();
                        self.mode = Mode::Idle;
                        self.push_notice(format!(
                            "Loaded {} turns from {} (model {})",
                            self.history.len(),
                            path.display(),
                            self.model
                        ));
                    }
                    Err(error) => self.push_notice(format!("Load failed: {error}")),
                }
            }
            SlashCommand::Quit => {
                if self.active_request().is_some() {
                    host.cancel();
                }
                self.exit();
            }
            SlashCommand::Unknown(command) => {
                self.push_notice(format!("Unknown command: {command}"));
            }
        }
    }

    fn on_cancel(&mut self, host: &mut dyn HostOps) {
        match (self.active_request(), host.cancel()) {
            (Some(active), Some(cancelled)) if active == cancelled => {
                self.finish_reasoning_line();
                self.mode = Mode::Idle;
                self.push_notice("Request cancelled");
                self.settle();
            }
            _ => self.push_notice("No active request"),
        }
    }

    fn is_active_request(&self, request_id: RequestId) -> bool {
        !self.should_exit && self.active_request() == Some(request_id)
    }

    fn settle(&mut self) {
        if self.exit_when_idle {
            self.exit();
        }
    }

    fn exit(&mut self) {
        self.mode = Mode::Exiting;
        self.should_exit = true;
    }

    fn finish_reasoning_line(&mut self) {
        if !self.reasoning.is_empty() {
            self.output.push(Output::Reasoning("\n".to_string()));
        }
    }

    fn reset_stream_view(&mut self) {
        self.reasoning.clear();
        self.raw.clear();
        self.answer_html.clear();
    }

    fn push_notice(&mut self, content: impl Into<String>) {
        self.output.push(Output::Notice(content.into()));
    }
}

/// Suffix of `current` past `previous`, or all of `current` when it was rewritten.
fn appended_text<'a>(previous: &str, current: &'a str) -> &'a str {
    current.strip_prefix(previous).unwrap_or(current)
}
