use async_trait::async_trait;
use reqwest::{
    header::LOCATION,
    multipart::{Form, Part},
    redirect::Policy,
    Client,
};
use thiserror::Error;

pub const DB_FIELD: &str = "db";
pub const DB_FILE_NAME: &str = "baby.db";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("{0}")]
    Request(String),
}

/// Sends the database bytes and reports the raw response, never following redirects.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload_db(&self, bytes: Vec<u8>) -> Result<UploadResponse, TransportError>;
}

pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::none())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl UploadTransport for HttpUploader {
    async fn upload_db(&self, bytes: Vec<u8>) -> Result<UploadResponse, TransportError> {
        let form = Form::new().part(DB_FIELD, Part::bytes(bytes).file_name(DB_FILE_NAME));
        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let location = resp
            .headers()
            .get(LOCATION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
        Ok(UploadResponse {
            status: resp.status().as_u16(),
            location,
        })
    }
}
