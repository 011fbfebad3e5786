use crate::error::ChatError;
use crate::session::{Level, Notice, Phase, Session};

/// Extensions the upload control accepts
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["txt", "pdf", "docx"];

/// Render the single page for the current session state
pub fn render(session: &Session, notice: Option<&Notice>) -> String {
    let mut body = String::new();

    body.push_str("<h1>Knowledge Agent Chatbot</h1>\n");
    body.push_str(
        "<p>Ingest documents to the vector index and interact with the Knowledge Agent.</p>\n",
    );

    if let Some(notice) = notice {
        body.push_str(&notice_html(notice));
    }

    if session.phase() == Phase::CredentialsPending {
        body.push_str(concat!(
            "<form method=\"post\" action=\"/credentials\">\n",
            "<label>Gemini API key <input type=\"password\" name=\"gemini_api_key\"></label>\n",
            "<label>Vector store API key <input type=\"password\" name=\"vector_store_api_key\"></label>\n",
            "<button type=\"submit\">Save keys</button>\n",
            "</form>\n",
        ));
    }

    let accept = ACCEPTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",");
    body.push_str(&format!(
        concat!(
            "<form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\n",
            "<input type=\"file\" name=\"file\" accept=\"{}\">\n",
            "<button type=\"submit\">Upload</button>\n",
            "</form>\n",
        ),
        accept
    ));

    body.push_str(concat!(
        "<form method=\"post\" action=\"/ingest\">",
        "<button type=\"submit\">Ingest Documents</button>",
        "</form>\n",
    ));

    match session.index() {
        Some(handle) => {
            body.push_str(&format!(
                "<p class=\"index\">Index: {} ({} chunks)</p>\n",
                escape(handle.collection()),
                handle.chunks()
            ));
            body.push_str(concat!(
                "<form method=\"post\" action=\"/ask\">\n",
                "<label>You: <input type=\"text\" name=\"query\" autofocus></label>\n",
                "<button type=\"submit\">Ask</button>\n",
                "</form>\n",
            ));
            if let Some(turn) = session.last_turn() {
                body.push_str(&format!(
                    "<div class=\"turn\"><p><b>You:</b> {}</p><p><b>Agent:</b> {}</p></div>\n",
                    escape(&turn.query),
                    escape(&turn.response)
                ));
            }
        }
        None => {
            body.push_str(&notice_html(&Notice {
                level: Level::Warning,
                message: ChatError::NoIndex.to_string(),
            }));
        }
    }

    body.push_str(concat!(
        "<form method=\"post\" action=\"/clear\">",
        "<button type=\"submit\">Clear</button>",
        "</form>\n",
    ));

    format!(
        concat!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n",
            "<title>Knowledge Agent Chatbot</title>\n",
            "<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        ),
        STYLE, body
    )
}

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto}\
form{margin:.75rem 0}\
.notice{padding:.5rem .75rem;border-radius:4px}\
.success{background:#e6f4ea}.info{background:#e8f0fe}\
.warning{background:#fef7e0}.error{background:#fce8e6}\
.turn p{white-space:pre-wrap}";

fn notice_html(notice: &Notice) -> String {
    let class = match notice.level {
        Level::Success => "success",
        Level::Info => "info",
        Level::Warning => "warning",
        Level::Error => "error",
    };
    format!(
        "<p class=\"notice {}\">{}</p>\n",
        class,
        escape(&notice.message)
    )
}

/// Whether `file_name` has one of the accepted extensions
pub fn is_accepted(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
