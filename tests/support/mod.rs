#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use contratos_backend::{
    build_router,
    config::{AppState, Config},
    db::{InMemoryContractStore, LocalObjectStore},
};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

pub const BASE_URL: &str = "http://localhost:3000";

pub struct TestServer {
    pub addr: SocketAddr,
    pub author_token: String,
    pub state: AppState,
    // Mantém o diretório de arquivos vivo durante o teste
    _storage: tempfile::TempDir,
}

impl TestServer {
    pub fn author(&self) -> String {
        format!("Bearer {}", self.author_token)
    }
}

pub async fn spawn_server() -> TestServer {
    let storage = tempfile::tempdir().expect("tempdir");
    let config = Config {
        database_url: None,
        jwt_secret: "segredo-de-teste".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        public_base_url: BASE_URL.to_string(),
        sign_prefix: "assinar".to_string(),
        storage_dir: storage.path().to_path_buf(),
        fonts_dir: storage.path().join("fonts"),
        max_pdf_bytes: 1024 * 1024,
    };
    let objects = Arc::new(LocalObjectStore::new(storage.path(), BASE_URL));
    let state = AppState::with_stores(config, Arc::new(InMemoryContractStore::new()), objects)
        .expect("app state");
    let author_token = state
        .auth_service
        .issue_author_token(Uuid::new_v4())
        .expect("author token");

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    TestServer {
        addr,
        author_token,
        state,
        _storage: storage,
    }
}

pub async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<(&str, &[u8])>,
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if let Some((content_type, payload)) = body {
        req.push_str(&format!("Content-Type: {content_type}\r\n"));
        req.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    } else if method != "GET" {
        req.push_str("Content-Length: 0\r\n");
    }
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    req.push_str("\r\n");
    let mut bytes = req.into_bytes();
    if let Some((_, payload)) = body {
        bytes.extend_from_slice(payload);
    }
    stream.write_all(&bytes).await.expect("write request");

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("read response");
    let response = String::from_utf8_lossy(&response).to_string();
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

pub async fn send_json(
    addr: SocketAddr,
    method: &str,
    path: &str,
    auth: Option<&str>,
    body: serde_json::Value,
) -> (u16, serde_json::Value) {
    let payload = body.to_string();
    let headers: Vec<(&str, &str)> = auth.map(|a| ("Authorization", a)).into_iter().collect();
    let (status, _, body) = send_raw(
        addr,
        method,
        path,
        &headers,
        Some(("application/json", payload.as_bytes())),
    )
    .await;
    (status, parse(&body))
}

pub async fn get_json(addr: SocketAddr, path: &str, auth: Option<&str>) -> (u16, serde_json::Value) {
    let headers: Vec<(&str, &str)> = auth.map(|a| ("Authorization", a)).into_iter().collect();
    let (status, _, body) = send_raw(addr, "GET", path, &headers, None).await;
    (status, parse(&body))
}

fn parse(body: &str) -> serde_json::Value {
    if body.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
    }
}

// Canvas transparente com um traço, como o exportado pelo pad de assinatura
pub fn stroke_data_url() -> String {
    let mut canvas = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 0]));
    for i in 0..20 {
        canvas.put_pixel(i * 2, i, Rgba([10, 10, 60, 255]));
    }
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .expect("encode png");
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

pub fn viewport() -> serde_json::Value {
    serde_json::json!({ "left": 0.0, "top": 0.0, "width": 1000.0, "scrollTop": 0.0, "scrollHeight": 1000.0 })
}
