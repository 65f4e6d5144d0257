//! HTTP API integration tests.
//!
//! Each test starts the real router on an ephemeral port and drives it with
//! `reqwest` multipart uploads. The LLM is either absent, a local fake of the
//! Gemini REST endpoint, or an in-process `TextGenerator`. No test touches
//! the network or needs the pdfium library.

mod common;

use async_trait::async_trait;
use common::{blank_pdf, closed_port_url, invoice_pdf, pdf_with_pages, spawn, FakeGemini};
use edgequake_pdf2table::pipeline::text::extract_text;
use edgequake_pdf2table::{
    router, ExtractorConfig, GenerationError, InvoiceExtractor, OcrEngine, OcrError,
    OpticalFallback, PageRasterizer, RenderedPage, TextGenerator,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const TABLE_REPLY: &str = "```json\n{\"tables\":[{\"title\":\"Items\",\"headers\":[\"a\"],\"rows\":[[\"1\"]]}],\"summary\":{\"total_amount\":50,\"invoice_count\":1,\"date_range\":null}}\n```";

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn start(extractor: InvoiceExtractor) -> String {
    spawn(router(Arc::new(extractor))).await
}

async fn start_with(config: ExtractorConfig) -> String {
    start(InvoiceExtractor::new(config).unwrap()).await
}

fn gemini_config(api_base: &str) -> ExtractorConfig {
    ExtractorConfig::builder()
        .api_key("test-key")
        .api_base(api_base)
        .api_timeout_secs(5)
        .build()
        .unwrap()
}

async fn upload(base: &str, filename: &str, bytes: Vec<u8>) -> reqwest::Response {
    let part = Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str("application/pdf")
        .unwrap();
    reqwest::Client::new()
        .post(format!("{base}/api/extract"))
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .unwrap()
}

async fn json_body(resp: reqwest::Response) -> Value {
    resp.json::<Value>().await.unwrap()
}

/// In-process generator that records prompts.
struct Recording {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Generator that panics mid-request.
struct Exploding;

#[async_trait]
impl TextGenerator for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        panic!("generator blew up");
    }
}

// ── Service endpoints ────────────────────────────────────────────────────────

#[tokio::test]
async fn root_reports_running() {
    let base = start_with(ExtractorConfig::default()).await;
    let body = json_body(reqwest::get(format!("{base}/")).await.unwrap()).await;
    assert_eq!(body["message"], "PDF Data Extractor API is running");
}

#[tokio::test]
async fn health_reports_credential_state() {
    let base = start_with(ExtractorConfig::default()).await;
    let body = json_body(reqwest::get(format!("{base}/health")).await.unwrap()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["api_key_configured"], false);

    let base = start_with(gemini_config("http://127.0.0.1:9")).await;
    let body = json_body(reqwest::get(format!("{base}/health")).await.unwrap()).await;
    assert_eq!(body["api_key_configured"], true);
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_filename_is_400() {
    let base = start_with(ExtractorConfig::default()).await;
    // Valid PDF content does not matter; only the declared name does.
    let resp = upload(&base, "invoice.txt", invoice_pdf()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["detail"], "Only PDF files are allowed");
}

#[tokio::test]
async fn uppercase_suffix_is_accepted() {
    let base = start_with(ExtractorConfig::default()).await;
    let resp = upload(&base, "INVOICE.PDF", invoice_pdf()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_file_field_is_400() {
    let base = start_with(ExtractorConfig::default()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/extract"))
        .multipart(Form::new().text("note", "no file here"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["detail"].is_string());
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let config = ExtractorConfig::builder()
        .max_upload_bytes(1024)
        .build()
        .unwrap();
    let base = start_with(config).await;

    let mut bytes = invoice_pdf();
    bytes.resize(4096, b' ');
    let resp = upload(&base, "big.pdf", bytes).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let detail = json_body(resp).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("4096"), "got: {detail}");
}

#[tokio::test]
async fn body_far_over_limit_is_413() {
    let config = ExtractorConfig::builder()
        .max_upload_bytes(1024)
        .build()
        .unwrap();
    let base = start_with(config).await;
    let resp = upload(&base, "huge.pdf", vec![b'x'; 100 * 1024]).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn garbage_pdf_is_422() {
    let base = start_with(ExtractorConfig::default()).await;
    let resp = upload(&base, "broken.pdf", b"definitely not a pdf".to_vec()).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let detail = json_body(resp).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Could not read PDF"), "got: {detail}");
}

// ── Text layer ───────────────────────────────────────────────────────────────

#[test]
fn text_layer_is_extracted() {
    let text = extract_text(&invoice_pdf()).unwrap();
    assert!(!text.trim().is_empty());
    assert!(text.contains("Invoice"), "got: {text:?}");
}

#[test]
fn pages_are_concatenated_in_order() {
    let text = extract_text(&pdf_with_pages(&["Alpha page", "Omega page"])).unwrap();
    let alpha = text.find("Alpha").expect("first page text");
    let omega = text.find("Omega").expect("second page text");
    assert!(alpha < omega);
}

#[test]
fn blank_page_has_blank_text() {
    let text = extract_text(&blank_pdf()).unwrap();
    assert!(text.trim().is_empty(), "got: {text:?}");
}

#[tokio::test]
async fn blank_text_layer_is_soft_failure() {
    let fake = FakeGemini::replying(TABLE_REPLY).await;
    let base = start_with(gemini_config(&fake.base_url)).await;

    let resp = upload(&base, "scan.pdf", blank_pdf()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["filename"], "scan.pdf");
    assert_eq!(body["data"]["tables"], serde_json::json!([]));
    assert!(body["data"]["summary"].is_null());
    assert_eq!(body["data"]["message"], "No text found - might be scanned PDF");
    assert_eq!(fake.recorded().calls, 0);
}

// ── LLM paths ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_credential_returns_preview() {
    let base = start_with(ExtractorConfig::default()).await;
    let long_line = "Line item widget ".repeat(60);
    let resp = upload(&base, "long.pdf", pdf_with_pages(&[long_line.as_str()])).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["message"], "No API key configured");
    let preview = body["data"]["text_preview"].as_str().unwrap();
    assert!(!preview.is_empty());
    assert!(preview.chars().count() <= 500);
    assert_eq!(body["data"]["tables"], serde_json::json!([]));
}

#[tokio::test]
async fn end_to_end_with_fake_gemini() {
    let fake = FakeGemini::replying(TABLE_REPLY).await;
    let base = start_with(gemini_config(&fake.base_url)).await;

    let resp = upload(&base, "invoice.pdf", invoice_pdf()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "invoice.pdf");
    assert_eq!(body["data"]["tables"][0]["headers"], serde_json::json!(["a"]));
    assert_eq!(body["data"]["tables"][0]["title"], "Items");
    assert_eq!(body["data"]["summary"]["invoice_count"], 1);
    assert!(body["data"].get("error").is_none());

    let rec = fake.recorded();
    assert_eq!(rec.calls, 1);
    assert!(
        rec.path_and_query
            .starts_with("/v1beta/models/gemini-2.5-flash:generateContent"),
        "got: {}",
        rec.path_and_query
    );
    assert!(rec.path_and_query.contains("key=test-key"));
    assert!(rec.prompt.contains("Invoice"), "prompt: {}", rec.prompt);
    assert!(rec.prompt.contains("Return ONLY valid JSON"));
}

#[tokio::test]
async fn remote_500_is_absorbed() {
    let fake = FakeGemini::failing(reqwest::StatusCode::INTERNAL_SERVER_ERROR).await;
    let base = start_with(gemini_config(&fake.base_url)).await;

    let resp = upload(&base, "invoice.pdf", invoice_pdf()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["error"], "Could not connect to LLM API");
    assert_eq!(body["data"]["tables"], serde_json::json!([]));
}

#[tokio::test]
async fn transport_failure_is_absorbed() {
    let base = start_with(gemini_config(&closed_port_url().await)).await;

    let resp = upload(&base, "invoice.pdf", invoice_pdf()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["error"], "Could not connect to LLM API");
}

#[tokio::test]
async fn slow_remote_times_out_gracefully() {
    let fake = FakeGemini::stalling(TABLE_REPLY, Duration::from_secs(5)).await;
    let config = ExtractorConfig::builder()
        .api_key("test-key")
        .api_base(&fake.base_url)
        .api_timeout_secs(1)
        .build()
        .unwrap();
    let base = start_with(config).await;

    let started = Instant::now();
    let resp = upload(&base, "invoice.pdf", invoice_pdf()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["error"], "Could not connect to LLM API");
    assert_eq!(body["data"]["tables"], serde_json::json!([]));
    assert_eq!(fake.recorded().calls, 1);
}

#[tokio::test]
async fn transient_failure_is_retried_when_configured() {
    let fake = FakeGemini::failing(reqwest::StatusCode::SERVICE_UNAVAILABLE).await;
    let config = ExtractorConfig::builder()
        .api_key("test-key")
        .api_base(&fake.base_url)
        .max_retries(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    let base = start_with(config).await;

    let body = json_body(upload(&base, "invoice.pdf", invoice_pdf()).await).await;
    assert_eq!(body["data"]["error"], "Could not connect to LLM API");
    assert_eq!(fake.recorded().calls, 3);
}

#[tokio::test]
async fn prose_reply_is_parse_error() {
    let fake = FakeGemini::replying("I found no tables in this document.").await;
    let base = start_with(gemini_config(&fake.base_url)).await;

    let body = json_body(upload(&base, "invoice.pdf", invoice_pdf()).await).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["error"], "Could not parse AI response");
    assert_eq!(
        body["data"]["raw_response"],
        "I found no tables in this document."
    );
}

#[tokio::test]
async fn generator_panic_is_500_with_detail() {
    let config = ExtractorConfig::builder()
        .generator(Arc::new(Exploding))
        .build()
        .unwrap();
    let base = start_with(config).await;

    let resp = upload(&base, "invoice.pdf", invoice_pdf()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(body["detail"], "generator blew up");

    // The server keeps serving after the panic.
    let health = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn injected_generator_receives_truncated_text() {
    let generator = Arc::new(Recording {
        reply: TABLE_REPLY.to_string(),
        prompts: Mutex::new(Vec::new()),
    });
    let config = ExtractorConfig::builder()
        .generator(generator.clone())
        .prompt_char_limit(40)
        .build()
        .unwrap();
    let base = start_with(config).await;

    let long_line = "Widget ".repeat(100);
    let body = json_body(upload(&base, "invoice.pdf", pdf_with_pages(&[long_line.as_str()])).await).await;
    assert_eq!(body["success"], true);

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let (_, text) = prompts[0].rsplit_once("Text: ").unwrap();
    assert!(text.chars().count() <= 40, "got {} chars", text.chars().count());
}

// ── Optical fallback ─────────────────────────────────────────────────────────

struct OnePage;

impl PageRasterizer for OnePage {
    fn rasterize(&self, _bytes: &[u8]) -> Result<Vec<RenderedPage>, OcrError> {
        Ok(vec![RenderedPage {
            page_num: 1,
            width: 1,
            height: 1,
            png: Vec::new(),
        }])
    }
}

struct FixedOcr(&'static str);

#[async_trait]
impl OcrEngine for FixedOcr {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn recognize(&self, _page: &RenderedPage) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn blank_pdf_uses_optical_fallback() {
    let generator = Arc::new(Recording {
        reply: TABLE_REPLY.to_string(),
        prompts: Mutex::new(Vec::new()),
    });
    let config = ExtractorConfig::builder()
        .generator(generator.clone())
        .build()
        .unwrap();
    let extractor = InvoiceExtractor::new(config)
        .unwrap()
        .with_optical_fallback(OpticalFallback::new(
            Arc::new(OnePage),
            Arc::new(FixedOcr("SCANNED Invoice #77 Total 12.00")),
        ));
    let base = start(extractor).await;

    let body = json_body(upload(&base, "scan.pdf", blank_pdf()).await).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["tables"][0]["headers"], serde_json::json!(["a"]));
    assert!(generator.prompts.lock().unwrap()[0].contains("SCANNED Invoice #77"));
}

#[tokio::test]
async fn empty_ocr_result_is_soft_failure() {
    let extractor = InvoiceExtractor::new(ExtractorConfig::default())
        .unwrap()
        .with_optical_fallback(OpticalFallback::new(
            Arc::new(OnePage),
            Arc::new(FixedOcr("   \n")),
        ));
    let base = start(extractor).await;

    let body = json_body(upload(&base, "scan.pdf", blank_pdf()).await).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["message"], "No text found - might be scanned PDF");
}
