//! Shared helpers for integration tests: in-memory PDF fixtures and a fake
//! Gemini endpoint.

#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, http::Uri, response::IntoResponse, Json, Router};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

// ── PDF fixtures ─────────────────────────────────────────────────────────────

fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Build a PDF with one page per entry of `pages`. An empty entry produces a
/// page with no text at all.
///
/// Uses the built-in Helvetica font, so no font program is embedded. Xref
/// offsets are computed, so strict parsers accept the file.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        String::new(), // page tree, filled below once kids are known
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut kids = Vec::new();
    for text in pages {
        let page_id = objects.len() + 1;
        let content_id = page_id + 1;
        kids.push(format!("{page_id} 0 R"));

        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));

        let content = if text.is_empty() {
            "q Q".to_string()
        } else {
            format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", escape_pdf_string(text))
        };
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }
    objects[1] = format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages.len()
    );

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, body).unwrap();
    }

    let xref_at = out.len();
    write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).unwrap();
    for off in offsets {
        write!(out, "{off:010} 00000 n \n").unwrap();
    }
    write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    )
    .unwrap();
    out
}

/// Single-page invoice with a real text layer.
pub fn invoice_pdf() -> Vec<u8> {
    pdf_with_pages(&["Invoice #123, Total: $50"])
}

/// Single page, valid container, no text layer.
pub fn blank_pdf() -> Vec<u8> {
    pdf_with_pages(&[""])
}

// ── Fake Gemini endpoint ─────────────────────────────────────────────────────

/// What the fake endpoint received on its most recent call.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub calls: usize,
    pub path_and_query: String,
    pub prompt: String,
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    reply: String,
    delay: Duration,
    recorded: Arc<Mutex<Recorded>>,
}

async fn fake_generate(
    State(state): State<FakeState>,
    uri: Uri,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    {
        let mut rec = state.recorded.lock().unwrap();
        rec.calls += 1;
        rec.path_and_query = uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_default();
        rec.prompt = body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
    }

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    if !state.status.is_success() {
        return (state.status, Json(json!({"error": {"message": "boom"}})));
    }

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {"parts": [{"text": state.reply}], "role": "model"},
                "finishReason": "STOP"
            }]
        })),
    )
}

/// A running fake Gemini API. Every path answers like `generateContent`.
pub struct FakeGemini {
    pub base_url: String,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeGemini {
    pub async fn replying(reply: &str) -> Self {
        Self::start(StatusCode::OK, reply, Duration::ZERO).await
    }

    pub async fn failing(status: StatusCode) -> Self {
        Self::start(status, "", Duration::ZERO).await
    }

    /// Answers with `reply`, but only after `delay`.
    pub async fn stalling(reply: &str, delay: Duration) -> Self {
        Self::start(StatusCode::OK, reply, delay).await
    }

    async fn start(status: StatusCode, reply: &str, delay: Duration) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = FakeState {
            status,
            reply: reply.to_string(),
            delay,
            recorded: Arc::clone(&recorded),
        };
        let app = Router::new().fallback(fake_generate).with_state(state);
        let base_url = spawn(app).await;
        Self { base_url, recorded }
    }

    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }
}

/// Serve `app` on an ephemeral local port; returns its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A local URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
