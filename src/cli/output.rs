use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{DocumentList, OutputFormat, QueryResponse};
use crate::server::protocol::StatusResponse;

pub trait Formatter {
    fn format_query(&self, response: &QueryResponse, show_context: bool) -> String;
    fn format_upload(&self, summary: &UploadSummary) -> String;
    fn format_documents(&self, list: &DocumentList) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub daemon_running: bool,
    pub socket_path: String,
    pub daemon: Option<StatusResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub path: String,
    pub chunks_created: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadSummary {
    pub files_scanned: usize,
    pub files_uploaded: usize,
    pub files_skipped: usize,
    pub chunks_created: usize,
    pub duration_ms: u64,
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadSummary {
    pub fn push_success(&mut self, path: String, chunks_created: usize) {
        self.files_uploaded += 1;
        self.chunks_created += chunks_created;
        self.outcomes.push(UploadOutcome {
            path,
            chunks_created,
            error: None,
        });
    }

    pub fn push_failure(&mut self, path: String, error: String) {
        self.files_skipped += 1;
        self.outcomes.push(UploadOutcome {
            path,
            chunks_created: 0,
            error: Some(error),
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_query(&self, response: &QueryResponse, show_context: bool) -> String {
        let mut output = String::new();
        writeln!(output, "Question: {}", response.query).unwrap();
        writeln!(output).unwrap();
        writeln!(output, "{}", response.answer).unwrap();
        writeln!(output).unwrap();

        if response.sources.is_empty() {
            writeln!(output, "No sources.").unwrap();
            return output;
        }

        writeln!(output, "Sources ({})", response.sources.len()).unwrap();
        for (i, source) in response.sources.iter().enumerate() {
            writeln!(
                output,
                "{}. {} #{} [Distance: {:.4}]",
                i + 1,
                source.source,
                source.chunk_id,
                source.similarity_score
            )
            .unwrap();
            for line in source.preview.lines() {
                writeln!(output, "   {}", line).unwrap();
            }
        }

        if show_context {
            writeln!(output).unwrap();
            writeln!(output, "Context").unwrap();
            writeln!(output, "-------").unwrap();
            writeln!(output, "{}", response.context).unwrap();
        }

        output
    }

    fn format_upload(&self, summary: &UploadSummary) -> String {
        let mut output = String::new();
        writeln!(output, "Upload Complete").unwrap();
        writeln!(output, "---------------").unwrap();
        writeln!(output, "Files scanned:  {}", summary.files_scanned).unwrap();
        writeln!(output, "Files uploaded: {}", summary.files_uploaded).unwrap();
        writeln!(output, "Files skipped:  {}", summary.files_skipped).unwrap();
        writeln!(output, "Chunks created: {}", summary.chunks_created).unwrap();
        writeln!(output, "Duration: {}ms", summary.duration_ms).unwrap();

        let mut failures = summary.failures().peekable();
        if failures.peek().is_some() {
            writeln!(output).unwrap();
            for failure in failures {
                writeln!(
                    output,
                    "  ✗ {}: {}",
                    failure.path,
                    failure.error.as_deref().unwrap_or_default()
                )
                .unwrap();
            }
        }
        output
    }

    fn format_documents(&self, list: &DocumentList) -> String {
        if list.documents.is_empty() {
            return "No documents uploaded.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "Documents ({})", list.total_documents).unwrap();
        writeln!(output, "---------").unwrap();
        for doc in &list.documents {
            writeln!(
                output,
                "  {} ({} chunks, {} bytes, {})",
                doc.filename, doc.chunks, doc.metadata.size_bytes, doc.metadata.uploaded_at
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let daemon_status = if status.daemon_running {
            "[RUNNING]"
        } else {
            "[STOPPED]"
        };
        writeln!(output, "Daemon:        {}", daemon_status).unwrap();
        writeln!(output, "  Socket:      {}", status.socket_path).unwrap();

        if let Some(ref d) = status.daemon {
            writeln!(output, "  Uptime:      {}s", d.uptime_secs).unwrap();
            writeln!(output, "  Idle:        {}s", d.idle_secs).unwrap();
            writeln!(output).unwrap();
            writeln!(output, "Embedding:     {} ({} dims)", d.provider, d.dimension).unwrap();
            writeln!(output, "Answers:       {}", d.answer_synthesizer).unwrap();
            writeln!(output, "Vector Store:  {}", d.vector_store).unwrap();
            writeln!(output, "  Documents:   {}", d.documents).unwrap();
            writeln!(output, "  Passages:    {}", d.passages).unwrap();
            if let Some(ref m) = d.metrics {
                writeln!(output).unwrap();
                writeln!(output, "Requests:      {}", m.total_requests).unwrap();
                writeln!(output, "  Uploads:     {}", m.uploads).unwrap();
                writeln!(output, "  Queries:     {}", m.queries).unwrap();
                writeln!(output, "  Avg Latency: {}ms", m.avg_latency_ms).unwrap();
                if m.error_rate > 0.0 {
                    writeln!(output, "  Error Rate:  {:.1}%", m.error_rate).unwrap();
                }
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &impl Serialize) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_query(&self, response: &QueryResponse, _show_context: bool) -> String {
        self.render(response)
    }

    fn format_upload(&self, summary: &UploadSummary) -> String {
        self.render(summary)
    }

    fn format_documents(&self, list: &DocumentList) -> String {
        self.render(list)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_query(&self, response: &QueryResponse, show_context: bool) -> String {
        let mut output = String::new();
        writeln!(output, "## Answer\n").unwrap();
        writeln!(output, "**Question:** `{}`\n", response.query).unwrap();
        writeln!(output, "{}\n", response.answer).unwrap();

        if !response.sources.is_empty() {
            writeln!(output, "### Sources\n").unwrap();
            writeln!(output, "| # | Source | Chunk | Distance |").unwrap();
            writeln!(output, "|---|--------|-------|----------|").unwrap();
            for (i, source) in response.sources.iter().enumerate() {
                writeln!(
                    output,
                    "| {} | `{}` | {} | {:.4} |",
                    i + 1,
                    source.source,
                    source.chunk_id,
                    source.similarity_score
                )
                .unwrap();
            }
            writeln!(output).unwrap();
        }

        if show_context {
            writeln!(output, "### Context\n").unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", response.context).unwrap();
            writeln!(output, "```").unwrap();
        }

        output
    }

    fn format_upload(&self, summary: &UploadSummary) -> String {
        let mut output = String::new();
        writeln!(output, "## Upload Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Files scanned | {} |", summary.files_scanned).unwrap();
        writeln!(output, "| Files uploaded | {} |", summary.files_uploaded).unwrap();
        writeln!(output, "| Files skipped | {} |", summary.files_skipped).unwrap();
        writeln!(output, "| Chunks created | {} |", summary.chunks_created).unwrap();
        writeln!(output, "| Duration | {}ms |", summary.duration_ms).unwrap();

        let mut failures = summary.failures().peekable();
        if failures.peek().is_some() {
            writeln!(output, "\n### Skipped\n").unwrap();
            for failure in failures {
                writeln!(
                    output,
                    "- `{}`: {}",
                    failure.path,
                    failure.error.as_deref().unwrap_or_default()
                )
                .unwrap();
            }
        }
        output
    }

    fn format_documents(&self, list: &DocumentList) -> String {
        if list.documents.is_empty() {
            return "## Documents\n\n*No documents uploaded.*\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "## Documents\n").unwrap();
        writeln!(output, "| File | Chunks | Bytes | Uploaded |").unwrap();
        writeln!(output, "|------|--------|-------|----------|").unwrap();
        for doc in &list.documents {
            writeln!(
                output,
                "| `{}` | {} | {} | {} |",
                doc.filename, doc.chunks, doc.metadata.size_bytes, doc.metadata.uploaded_at
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let daemon_status = if status.daemon_running { "✅" } else { "❌" };
        writeln!(output, "### Daemon {}\n", daemon_status).unwrap();
        writeln!(output, "- **Socket:** `{}`", status.socket_path).unwrap();

        if let Some(ref d) = status.daemon {
            writeln!(output, "- **Uptime:** {}s", d.uptime_secs).unwrap();
            writeln!(output, "- **Embedding:** {} ({} dims)", d.provider, d.dimension).unwrap();
            writeln!(output, "- **Answers:** {}", d.answer_synthesizer).unwrap();
            writeln!(output, "- **Vector Store:** {}", d.vector_store).unwrap();
            writeln!(output, "- **Documents:** {}", d.documents).unwrap();
            writeln!(output, "- **Passages:** {}", d.passages).unwrap();
            if let Some(ref m) = d.metrics {
                writeln!(output, "- **Requests:** {}", m.total_requests).unwrap();
                writeln!(output, "- **Avg Latency:** {}ms", m.avg_latency_ms).unwrap();
                if m.error_rate > 0.0 {
                    writeln!(output, "- **Error Rate:** {:.1}%", m.error_rate).unwrap();
                }
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
