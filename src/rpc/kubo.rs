//! HTTP RPC client for a Kubo daemon
//!
//! Every command is a `POST <api_url>/<command>?arg=...`. Writes and
//! directory adds carry a `reqwest::multipart` form whose file parts are read
//! from disk only when the body is sent. An [`AddSource::Entries`] sequence
//! is framed by hand so it can be pulled one file at a time while the request
//! is in flight. Add responses are newline-delimited JSON and are decoded as
//! they arrive.

use super::{
    AddEntry, AddOptions, AddSource, AddedEntry, Cid, CpOptions, DirEntry, FileStat, MfsApi,
    NodeKind, ProgressFn, WriteOptions,
};
use crate::error::{HarnessError, Result};
use crate::staging;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const FILE_MIME: &str = "application/octet-stream";
const DIRECTORY_MIME: &str = "application/x-directory";

/// Kubo's error body: `{"Message": "...", "Code": 0, "Type": "error"}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatResponse {
    hash: String,
    size: u64,
    cumulative_size: u64,
    #[serde(rename = "Type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FlushResponse {
    cid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsResponse {
    #[serde(default)]
    entries: Option<Vec<LsEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsEntry {
    name: String,
    #[serde(rename = "Type")]
    kind: u8,
    size: u64,
    #[serde(default)]
    hash: String,
}

/// One line of the streamed `add` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddLine {
    #[serde(default)]
    name: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success response body to a harness error
fn daemon_error(command: &str, arg: Option<&str>, body: &str) -> HarnessError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let lowered = message.to_lowercase();
    if lowered.contains("does not exist") || lowered.contains("not found") {
        return HarnessError::NotFound(arg.unwrap_or(command).to_string());
    }
    HarnessError::Rpc {
        command: command.to_string(),
        message,
    }
}

/// Incremental decoder for the newline-delimited `add` response
#[derive(Debug, Default)]
struct AddStreamDecoder {
    buffer: Vec<u8>,
    reported: HashMap<String, u64>,
    entries: Vec<AddedEntry>,
}

impl AddStreamDecoder {
    fn push(&mut self, chunk: &[u8], progress: Option<ProgressFn<'_>>) -> Result<()> {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line, progress)?;
        }
        Ok(())
    }

    fn finish(mut self, progress: Option<ProgressFn<'_>>) -> Result<Vec<AddedEntry>> {
        let rest = std::mem::take(&mut self.buffer);
        self.decode_line(&rest, progress)?;
        Ok(self.entries)
    }

    fn decode_line(&mut self, line: &[u8], progress: Option<ProgressFn<'_>>) -> Result<()> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        let line: AddLine = serde_json::from_slice(line).map_err(|e| HarnessError::Decode {
            command: "add".to_string(),
            message: e.to_string(),
        })?;
        if let Some(message) = line.message {
            return Err(HarnessError::Rpc {
                command: "add".to_string(),
                message,
            });
        }
        match (line.hash, line.bytes) {
            (Some(hash), _) => {
                let size = line
                    .size
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                self.entries.push(AddedEntry {
                    path: line.name,
                    cid: Cid::new(hash),
                    size,
                });
            }
            (None, Some(bytes)) => {
                // Progress lines carry a running total per file
                let seen = self.reported.entry(line.name).or_insert(0);
                let delta = bytes.saturating_sub(*seen);
                *seen = bytes.max(*seen);
                if let (Some(report), true) = (progress, delta > 0) {
                    report(delta);
                }
            }
            (None, None) => {}
        }
        Ok(())
    }
}

/// Form-data filename for a staged path; the daemon unescapes it
fn encoded_filename(path: &str) -> String {
    url::form_urlencoded::byte_serialize(path.as_bytes()).collect()
}

/// Request body of one command
#[derive(Debug)]
enum Payload {
    Form(Form),
    /// Hand-framed multipart stream with its content type
    Framed(String, Body),
}

/// Multipart framing for a lazily pulled sequence of file entries
#[derive(Debug, Clone)]
struct MultipartFraming {
    boundary: String,
}

impl MultipartFraming {
    fn new() -> Self {
        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);
        Self {
            boundary: format!("mfsbench-{}", hex::encode(nonce)),
        }
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn part(&self, path: &str, content: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            self.boundary,
            encoded_filename(path),
            FILE_MIME
        )
        .into_bytes();
        part.extend_from_slice(content);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn closing(&self) -> Vec<u8> {
        format!("--{}--\r\n", self.boundary).into_bytes()
    }
}

/// Client for the daemon's HTTP RPC API
#[derive(Debug, Clone)]
pub struct KuboClient {
    client: Client,
    base_url: String,
}

impl KuboClient {
    /// Create a client for an API base URL such as `http://localhost:15001/api/v0`
    ///
    /// No request timeout is set; a stalled daemon blocks the caller.
    pub fn new(api_url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| HarnessError::Transport {
                url: api_url.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, command: &str) -> String {
        format!("{}/{}", self.base_url, command)
    }

    async fn send(
        &self,
        command: &str,
        query: &[(&str, String)],
        payload: Option<Payload>,
    ) -> Result<Response> {
        let url = self.url(command);
        debug!(command, ?query, "rpc");
        let mut request = self.client.post(&url).query(query);
        request = match payload {
            Some(Payload::Form(form)) => request.multipart(form),
            Some(Payload::Framed(content_type, body)) => request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|source| HarnessError::Transport {
                url: url.clone(),
                source,
            })?;
        if response.status().is_success() {
            return Ok(response);
        }
        let arg = query
            .iter()
            .find(|(key, _)| *key == "arg")
            .map(|(_, value)| value.as_str());
        let text = response
            .text()
            .await
            .map_err(|source| HarnessError::Transport {
                url: url.clone(),
                source,
            })?;
        Err(daemon_error(command, arg, &text))
    }

    async fn call(&self, command: &str, query: &[(&str, String)]) -> Result<Response> {
        self.send(command, query, None).await
    }

    async fn json<T: DeserializeOwned>(&self, command: &str, response: Response) -> Result<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|source| HarnessError::Transport {
                url: self.url(command),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|e| HarnessError::Decode {
            command: command.to_string(),
            message: e.to_string(),
        })
    }

    /// Multipart payload for a bulk add
    fn add_payload(source: AddSource) -> Result<Payload> {
        match source {
            AddSource::Directory(root) => {
                let mut form = Form::new().percent_encode_noop();
                for item in staging::walk(&root)? {
                    form = form.part(item_name(item.is_dir), staged_part(item)?);
                }
                Ok(Payload::Form(form))
            }
            AddSource::Entries(entries) => {
                let framing = MultipartFraming::new();
                let content_type = framing.content_type();
                let closing = framing.closing();
                let parts = stream::iter(entries).map(move |AddEntry { path, content }| {
                    Ok::<_, std::io::Error>(framing.part(&path, &content))
                });
                let body = Body::wrap_stream(parts.chain(stream::once(async move { Ok(closing) })));
                Ok(Payload::Framed(content_type, body))
            }
        }
    }
}

fn item_name(is_dir: bool) -> &'static str {
    if is_dir {
        "dir"
    } else {
        "file"
    }
}

/// Form part for one staged entry; file bytes are read when the body is sent
fn staged_part(item: staging::StagedItem) -> Result<Part> {
    let filename = encoded_filename(&item.relative);
    let (part, mime) = if item.is_dir {
        (Part::bytes(Vec::new()), DIRECTORY_MIME)
    } else {
        let local = item.local;
        let content = stream::once(async move { tokio::fs::read(local).await });
        (Part::stream(Body::wrap_stream(content)), FILE_MIME)
    };
    part.file_name(filename)
        .mime_str(mime)
        .map_err(|e| HarnessError::Decode {
            command: "add".to_string(),
            message: e.to_string(),
        })
}

fn flag(value: bool) -> String {
    value.to_string()
}

#[async_trait]
impl MfsApi for KuboClient {
    async fn stat(&self, path: &str) -> Result<FileStat> {
        let response = self.call("files/stat", &[("arg", path.to_string())]).await?;
        let stat: StatResponse = self.json("files/stat", response).await?;
        let kind = if stat.kind == "directory" {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        Ok(FileStat {
            cid: Cid::new(stat.hash),
            size: stat.size,
            cumulative_size: stat.cumulative_size,
            kind,
        })
    }

    async fn mkdir(&self, path: &str, parents: bool) -> Result<()> {
        self.call(
            "files/mkdir",
            &[("arg", path.to_string()), ("parents", flag(parents))],
        )
        .await?;
        Ok(())
    }

    async fn rm(&self, path: &str, recursive: bool) -> Result<()> {
        self.call(
            "files/rm",
            &[("arg", path.to_string()), ("recursive", flag(recursive))],
        )
        .await?;
        Ok(())
    }

    async fn write(&self, path: &str, content: Vec<u8>, options: WriteOptions) -> Result<()> {
        let part = Part::bytes(content)
            .file_name("file")
            .mime_str(FILE_MIME)
            .map_err(|source| HarnessError::Transport {
                url: self.url("files/write"),
                source,
            })?;
        let form = Form::new().part("file", part);
        self.send(
            "files/write",
            &[
                ("arg", path.to_string()),
                ("create", flag(options.create)),
                ("parents", flag(options.parents)),
                ("truncate", flag(options.truncate)),
            ],
            Some(Payload::Form(form)),
        )
        .await?;
        Ok(())
    }

    async fn cp(&self, source: &Cid, dest: &str, options: CpOptions) -> Result<()> {
        self.call(
            "files/cp",
            &[
                ("arg", source.ipfs_path()),
                ("arg", dest.to_string()),
                ("parents", flag(options.parents)),
                ("flush", flag(options.flush)),
            ],
        )
        .await?;
        Ok(())
    }

    async fn flush(&self, path: &str) -> Result<Cid> {
        let response = self.call("files/flush", &[("arg", path.to_string())]).await?;
        let flushed: FlushResponse = self.json("files/flush", response).await?;
        Ok(Cid::new(flushed.cid))
    }

    async fn ls(&self, path: &str) -> Result<Vec<DirEntry>> {
        let response = self
            .call(
                "files/ls",
                &[("arg", path.to_string()), ("long", flag(true))],
            )
            .await?;
        let listing: LsResponse = self.json("files/ls", response).await?;
        Ok(listing
            .entries
            .unwrap_or_default()
            .into_iter()
            .map(|e| DirEntry {
                name: e.name,
                kind: if e.kind == 1 {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                },
                size: e.size,
                cid: Cid::new(e.hash),
            })
            .collect())
    }

    async fn add_all(
        &self,
        source: AddSource,
        options: AddOptions,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<AddedEntry>> {
        let payload = Self::add_payload(source)?;
        let response = self
            .send(
                "add",
                &[
                    ("wrap-with-directory", flag(options.wrap_with_directory)),
                    ("pin", flag(options.pin)),
                    ("progress", flag(progress.is_some())),
                    ("stream-channels", flag(true)),
                ],
                Some(payload),
            )
            .await?;

        let mut decoder = AddStreamDecoder::default();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|source| HarnessError::Transport {
                url: self.url("add"),
                source,
            })?;
            decoder.push(&chunk, progress)?;
        }
        decoder.finish(progress)
    }
}
