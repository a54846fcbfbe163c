//! Thin HTTP surface wrapping the inference front-end.
//!
//! A hand-rolled loopback server in the same shape as the rest of this
//! crate's service plumbing: a `TcpListener` accept loop on a background
//! thread, bounded request reads, and minimal routing. This is the
//! collaborator boundary for interactive use; the core logic lives in
//! `infer`.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::InferenceSettings;
use crate::detect::BackendRegistry;
use crate::infer::{self, InferenceOptions, InferenceOutput, InputModality};

const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    /// Defaults applied when a request omits model/size/threshold.
    pub defaults: InferenceSettings,
    pub output_dir: PathBuf,
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    registry: Arc<BackendRegistry>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, registry: Arc<BackendRegistry>) -> Self {
        Self { cfg, registry }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "api configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg;
        let registry = self.registry;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, cfg, registry, shutdown_thread) {
                log::error!("inference api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: ApiConfig,
    registry: Arc<BackendRegistry>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, &cfg, &registry) {
                    log::warn!("inference api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct InferRequest {
    input: InputModality,
    model_id: Option<String>,
    image_size: Option<u32>,
    conf_threshold: Option<f32>,
}

fn handle_connection(
    mut stream: TcpStream,
    cfg: &ApiConfig,
    registry: &BackendRegistry,
) -> Result<()> {
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(());
    }

    let request = read_request(&mut stream)?;
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") => {
            write_response(&mut stream, 200, "text/html; charset=utf-8", INDEX_HTML.as_bytes())
        }
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("POST", "/infer") => {
            let parsed: InferRequest = match serde_json::from_slice(&request.body) {
                Ok(parsed) => parsed,
                Err(err) => {
                    let body = serde_json::json!({
                        "error": format!("invalid request body: {}", err),
                    });
                    return write_json_response(&mut stream, 400, &body.to_string());
                }
            };
            let options = InferenceOptions {
                model_id: parsed
                    .model_id
                    .unwrap_or_else(|| cfg.defaults.model_id.clone()),
                image_size: parsed.image_size.unwrap_or(cfg.defaults.image_size),
                conf_threshold: parsed
                    .conf_threshold
                    .unwrap_or(cfg.defaults.conf_threshold),
                output_dir: cfg.output_dir.clone(),
            };
            match infer::run(registry, &parsed.input, &options) {
                Ok(InferenceOutput::AnnotatedImage(path)) => {
                    let body = serde_json::json!({ "annotated_image": path });
                    write_json_response(&mut stream, 200, &body.to_string())
                }
                Ok(InferenceOutput::OutputVideo(outcome)) => {
                    let body = serde_json::json!({
                        "output_video": outcome.output_path,
                        "frames_written": outcome.frames_written,
                        "new_classes": outcome.newly_seen,
                    });
                    write_json_response(&mut stream, 200, &body.to_string())
                }
                Err(err) => {
                    log::warn!("inference request failed: {:#}", err);
                    let body = serde_json::json!({ "error": format!("{:#}", err) });
                    write_json_response(&mut stream, 400, &body.to_string())
                }
            }
        }
        ("GET", _) | ("POST", _) => {
            write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#)
        }
        _ => write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#),
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break data
                .windows(4)
                .position(|w| w == b"\r\n\r\n")
                .map(|p| p + 4)
                .ok_or_else(|| anyhow!("truncated request"))?;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if let Some(p) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break p + 4;
        }
    };

    let header_text = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse().context("invalid Content-Length"))
        .transpose()?
        .unwrap_or(0);
    if header_end + content_length > MAX_REQUEST_BYTES {
        return Err(anyhow!("request body too large"));
    }
    let mut body = data[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("request body truncated"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        body,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>framescout</title></head>
<body>
<h1>framescout inference front-end</h1>
<p>POST <code>/infer</code> with a JSON body selecting exactly one input:</p>
<pre>
{
  "input": {"image": "/path/to/picture.jpg"},
  "model_id": "yolov10s",
  "image_size": 640,
  "conf_threshold": 0.25
}
</pre>
<p>Input variants: <code>{"image": path}</code>, <code>{"video": path}</code>,
<code>{"video_url": url}</code>. Image size accepts 320&ndash;1280; the
confidence threshold accepts 0.0&ndash;1.0.</p>
<p>The image modality answers with <code>annotated_image</code>; the video
modalities answer with <code>output_video</code> plus the classes first seen
during the run. <code>GET /health</code> is a liveness probe.</p>
</body>
</html>
"#;
