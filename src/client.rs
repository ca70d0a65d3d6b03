use crate::{error::VectorizeError, model::GenerationClient, prompt::GenerationRequest};
use serde::{Deserialize, Serialize};
use std::{error::Error as _, fmt, time::Duration};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variables holding the credential, in lookup order.
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

/// Connection settings for the Gemini `generateContent` endpoint.
///
/// The model is fixed; the endpoint only changes to point at a local server.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub timeout: Duration,
    endpoint: String,
    model: &'static str,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL,
        }
    }
}

impl ClientConfig {
    /// Reads the credential from the process environment.
    ///
    /// Blank values are treated as absent.
    pub fn from_env() -> Self {
        let api_key = API_KEY_VARS.iter().find_map(|name| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        });

        Self {
            api_key,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        self.model
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate_url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Content<'a>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(request: &'a GenerationRequest) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.payload.mime_type(),
                            data: request.payload.base64_data(),
                        },
                    },
                    Part::Text {
                        text: request.user_instruction,
                    },
                ],
            }],
            system_instruction: Content {
                parts: vec![Part::Text {
                    text: request.system_instruction,
                }],
            },
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, thought parts excluded.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ServiceError,
}

#[derive(Deserialize)]
struct ServiceError {
    message: String,
}

/// Generation client backed by the Gemini REST API.
///
/// The HTTP client is built lazily on the first call, on the thread that
/// runs the generation.
pub struct GeminiClient {
    config: ClientConfig,
    http: Option<reqwest::blocking::Client>,
}

impl GeminiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http: None }
    }

    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn http(&mut self) -> Result<&reqwest::blocking::Client, VectorizeError> {
        if self.http.is_none() {
            let client = reqwest::blocking::Client::builder()
                .timeout(self.config.timeout)
                .build()
                .map_err(|e| VectorizeError::GenerationFailed(error_chain(&e)))?;
            self.http = Some(client);
        }

        self.http
            .as_ref()
            .ok_or_else(|| VectorizeError::GenerationFailed("HTTP client unavailable".to_string()))
    }
}

impl GenerationClient for GeminiClient {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String, VectorizeError> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or(VectorizeError::MissingCredential)?;

        let url = self.config.generate_url();
        let body = GenerateContentRequest::new(request);

        log::debug!(
            "Sending {} image ({} bytes) to {} for {}",
            request.payload.mime_type(),
            request.payload.raw_bytes().len(),
            self.config.model,
            request.style
        );

        let response = self
            .http()?
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .map_err(|e| VectorizeError::GenerationFailed(error_chain(&e)))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| VectorizeError::GenerationFailed(error_chain(&e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("service returned {status}"));
            log::warn!("Generation request rejected with {status}");
            return Err(VectorizeError::GenerationFailed(message));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            VectorizeError::GenerationFailed(format!("invalid response from service: {e}"))
        })?;

        Ok(parsed.text())
    }
}

/// Renders an error with its sources, reqwest keeps the useful part there.
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encoder::ImagePayload, style::VectorStyle};
    use std::{
        io::{ErrorKind, Read, Write},
        net::TcpListener,
        thread,
    };

    fn request() -> GenerationRequest {
        let payload = ImagePayload::from_bytes(b"ABC".to_vec(), "image/webp").unwrap();
        GenerationRequest::new(payload, VectorStyle::PixelArt)
    }

    /// Serves one canned response and hands back the raw request it received.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });

        (endpoint, handle)
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request_json(raw: &str) -> serde_json::Value {
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn missing_credential_never_touches_the_network() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let mut client = GeminiClient::new(ClientConfig::default().with_endpoint(endpoint));
        let result = client.generate(&request());

        assert!(matches!(result, Err(VectorizeError::MissingCredential)));
        assert_eq!(
            listener.accept().map(|_| ()).unwrap_err().kind(),
            ErrorKind::WouldBlock
        );
        assert!(client.http.is_none());
    }

    #[test]
    fn sends_stripped_image_and_instructions() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"<svg>"},{"text":"</svg>"}]}}]}"#,
        );
        let config = ClientConfig::default()
            .with_api_key("secret")
            .with_endpoint(endpoint);
        let mut client = GeminiClient::new(config);

        let text = client.generate(&request()).unwrap();
        assert_eq!(text, "<svg></svg>");

        let raw = server.join().unwrap();
        let head = raw.split("\r\n\r\n").next().unwrap().to_ascii_lowercase();
        assert!(head.starts_with("post /v1beta/models/gemini-3-flash-preview:generatecontent "));
        assert!(head.contains("x-goog-api-key: secret"));

        let body = request_json(&raw);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/webp");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert_eq!(parts[1]["text"], VectorStyle::PixelArt.prompt());
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            crate::prompt::SYSTEM_INSTRUCTION
        );
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.4).abs() < 1e-6);
    }

    #[test]
    fn absent_text_is_an_empty_string() {
        let (endpoint, server) = serve_once("200 OK", r#"{"candidates":[]}"#);
        let mut client =
            GeminiClient::new(ClientConfig::default().with_api_key("k").with_endpoint(endpoint));

        assert_eq!(client.generate(&request()).unwrap(), "");
        server.join().unwrap();
    }

    #[test]
    fn thought_parts_are_skipped() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"thinking","thought":true},{"text":"<svg/>"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text(), "<svg/>");
    }

    #[test]
    fn service_errors_carry_the_service_message() {
        let (endpoint, server) = serve_once(
            "403 Forbidden",
            r#"{"error":{"code":403,"message":"API key not valid.","status":"PERMISSION_DENIED"}}"#,
        );
        let mut client =
            GeminiClient::new(ClientConfig::default().with_api_key("bad").with_endpoint(endpoint));

        match client.generate(&request()) {
            Err(VectorizeError::GenerationFailed(message)) => {
                assert_eq!(message, "API key not valid.")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn hung_requests_time_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(1500));
            drop(stream);
        });

        let config = ClientConfig::default()
            .with_api_key("k")
            .with_endpoint(endpoint)
            .with_timeout(Duration::from_millis(200));
        let mut client = GeminiClient::new(config);

        assert!(matches!(
            client.generate(&request()),
            Err(VectorizeError::GenerationFailed(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn endpoint_and_model_build_the_generate_url() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.model(), DEFAULT_MODEL);

        let config = config.with_endpoint("http://127.0.0.1:9000/");
        assert_eq!(config.endpoint(), "http://127.0.0.1:9000");
        assert_eq!(
            config.generate_url(),
            format!("http://127.0.0.1:9000/v1beta/models/{DEFAULT_MODEL}:generateContent")
        );
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let config = ClientConfig::default().with_api_key("super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
