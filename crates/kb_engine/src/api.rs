use bytes::Bytes;
use client_logging::client_warn;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use kb_core::{AuthState, PollStatus, Role, Session};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};

use crate::transport::AuthTransport;
use crate::types::map_reqwest_error;
use crate::{ClientError, ClientEvent, ClientSink, FailureKind, UploadFile};

/// Raw chat body, read incrementally.
pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

/// Typed view of the knowledge-base service's HTTP contract.
#[async_trait::async_trait]
pub trait KbApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<AuthState, ClientError>;

    async fn list_files(&self) -> Result<Vec<String>, ClientError>;

    async fn delete_file(&self, filename: &str) -> Result<(), ClientError>;

    /// Returns the filename the backend accepted the upload under.
    async fn upload_file(&self, file: &UploadFile) -> Result<String, ClientError>;

    async fn upload_status(&self, filename: &str) -> Result<PollStatus, ClientError>;

    async fn open_chat(&self, message: &str, session: &Session) -> Result<ByteStream, ClientError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    files: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    session_id: &'a str,
}

#[derive(Clone)]
pub struct HttpKbApi {
    transport: AuthTransport,
}

impl HttpKbApi {
    pub fn new(transport: AuthTransport) -> Self {
        Self { transport }
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .json::<ErrorDetail>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .unwrap_or_else(|| "unknown error".to_string());
    Err(ClientError::status(status.as_u16(), detail))
}

async fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response
        .json::<T>()
        .await
        .map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))
}

#[async_trait::async_trait]
impl KbApi for HttpKbApi {
    async fn login(&self, username: &str, password: &str) -> Result<AuthState, ClientError> {
        let request = self
            .transport
            .request(Method::POST, "token")?
            .form(&[("username", username), ("password", password)]);
        let response = self.transport.send_public(request).await?;
        if !response.status().is_success() {
            return Err(ClientError::new(
                FailureKind::InvalidCredentials,
                "wrong username or password",
            ));
        }
        let body: TokenResponse = decode_json(response).await?;
        Ok(AuthState::new(body.access_token, Role::parse(&body.role)))
    }

    async fn list_files(&self) -> Result<Vec<String>, ClientError> {
        let response = self
            .transport
            .send_authorized(Method::GET, "files", |request| request)
            .await?;
        let body: FilesResponse = decode_json(ensure_success(response).await?).await?;
        Ok(body.files.unwrap_or_default())
    }

    async fn delete_file(&self, filename: &str) -> Result<(), ClientError> {
        let response = self
            .transport
            .send_authorized(Method::DELETE, "files", |request| {
                request.query(&[("filename", filename)])
            })
            .await?;
        ensure_success(response).await.map(|_| ())
    }

    async fn upload_file(&self, file: &UploadFile) -> Result<String, ClientError> {
        let part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
        let form = Form::new().part("file", part);
        let response = self
            .transport
            .send_authorized(Method::POST, "upload", |request| request.multipart(form))
            .await?;
        let body: UploadResponse = decode_json(ensure_success(response).await?).await?;
        Ok(body.filename)
    }

    async fn upload_status(&self, filename: &str) -> Result<PollStatus, ClientError> {
        let request = self
            .transport
            .request(Method::GET, "upload-status")?
            .query(&[("filename", filename)]);
        let response = ensure_success(self.transport.send_public(request).await?).await?;
        let body: StatusResponse = decode_json(response).await?;
        Ok(PollStatus::parse(&body.status))
    }

    async fn open_chat(&self, message: &str, session: &Session) -> Result<ByteStream, ClientError> {
        let request = self
            .transport
            .request(Method::POST, "stream-chat")?
            .header(ACCEPT, "text/event-stream")
            .json(&ChatRequest {
                message,
                session_id: session.id(),
            });
        let response = self.transport.send_public(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::status(status.as_u16(), "connection failed"));
        }
        if status == reqwest::StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(ClientError::new(FailureKind::MissingBody, "response has no body"));
        }
        Ok(response.bytes_stream().map_err(map_reqwest_error).boxed())
    }
}

/// Fetches the authoritative file list and publishes it. Failures are logged only.
pub(crate) async fn publish_file_list(
    api: &dyn KbApi,
    sink: &dyn ClientSink,
) -> Result<Vec<String>, ClientError> {
    match api.list_files().await {
        Ok(files) => {
            sink.emit(ClientEvent::FilesRefreshed(files.clone()));
            Ok(files)
        }
        Err(err) => {
            client_warn!("Could not fetch file list: {}", err);
            Err(err)
        }
    }
}
