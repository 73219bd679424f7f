use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::config::NotifyConfig;
use crate::error::IngestError;

pub trait Notifier {
    fn post_message(&self, text: &str) -> Result<(), IngestError>;
    fn upload_file(
        &self,
        filename: &str,
        content: &str,
        title: Option<&str>,
    ) -> Result<(), IngestError>;
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    upload_url: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

impl SlackResponse {
    fn into_result(self) -> Result<Self, IngestError> {
        if self.ok {
            Ok(self)
        } else {
            Err(IngestError::NotifyRejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }

    fn upload_target(self) -> Result<(String, String), IngestError> {
        match (self.upload_url, self.file_id) {
            (Some(url), Some(id)) => Ok((url, id)),
            _ => Err(IngestError::NotifyHttp(
                "files.getUploadURLExternal returned no upload target".to_string(),
            )),
        }
    }
}

fn completion_payload(file_id: &str, title: Option<&str>) -> String {
    let mut file = serde_json::json!({ "id": file_id });
    if let Some(title) = title {
        file["title"] = serde_json::Value::from(title);
    }
    serde_json::Value::Array(vec![file]).to_string()
}

#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    channels: String,
    base_url: String,
}

impl SlackClient {
    pub fn new(config: &NotifyConfig) -> Result<Self, IngestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ncov-ingest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IngestError::NotifyHttp(err.to_string()))?,
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|err| IngestError::NotifyHttp(err.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| IngestError::NotifyHttp(err.to_string()))?;

        Ok(Self {
            client,
            channels: config.channels.clone(),
            base_url: "https://slack.com/api".to_string(),
        })
    }

    fn call(&self, method: &str, form: &[(&str, &str)]) -> Result<SlackResponse, IngestError> {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(form)
            .send()
            .map_err(|err| IngestError::NotifyHttp(err.to_string()))?;
        if !response.status().is_success() {
            return Err(IngestError::NotifyHttp(format!(
                "{method} returned status {}",
                response.status().as_u16()
            )));
        }
        response
            .json::<SlackResponse>()
            .map_err(|err| IngestError::NotifyHttp(err.to_string()))?
            .into_result()
    }
}

impl Notifier for SlackClient {
    fn post_message(&self, text: &str) -> Result<(), IngestError> {
        tracing::info!("posting message to {}", self.channels);
        self.call(
            "chat.postMessage",
            &[("channel", self.channels.as_str()), ("text", text)],
        )?;
        Ok(())
    }

    fn upload_file(
        &self,
        filename: &str,
        content: &str,
        title: Option<&str>,
    ) -> Result<(), IngestError> {
        tracing::info!("uploading {filename} to {}", self.channels);
        let length = content.len().to_string();
        let (upload_url, file_id) = self
            .call(
                "files.getUploadURLExternal",
                &[("filename", filename), ("length", length.as_str())],
            )?
            .upload_target()?;

        let response = self
            .client
            .post(&upload_url)
            .body(content.to_string())
            .send()
            .map_err(|err| IngestError::NotifyHttp(err.to_string()))?;
        if !response.status().is_success() {
            return Err(IngestError::NotifyHttp(format!(
                "upload of {filename} returned status {}",
                response.status().as_u16()
            )));
        }

        let files = completion_payload(&file_id, title);
        self.call(
            "files.completeUploadExternal",
            &[("files", files.as_str()), ("channels", self.channels.as_str())],
        )?;
        Ok(())
    }
}

pub fn upload_path<N: Notifier + ?Sized>(
    notifier: &N,
    path: &Path,
    title: Option<&str>,
) -> Result<(), IngestError> {
    let content = fs::read_to_string(path)
        .map_err(|err| IngestError::Filesystem(format!("read {}: {err}", path.display())))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment.txt".to_string());
    notifier.upload_file(&filename, &content, title)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn slack_error_is_surfaced() {
        let response: SlackResponse =
            serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        assert_matches!(
            response.into_result(),
            Err(IngestError::NotifyRejected(message)) if message == "channel_not_found"
        );
        let response: SlackResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(response.into_result().is_ok());
    }

    #[test]
    fn upload_target_comes_from_external_url_response() {
        let response: SlackResponse = serde_json::from_str(
            r#"{"ok":true,"upload_url":"https://files.slack.com/upload/v1/abc","file_id":"F123"}"#,
        )
        .unwrap();
        assert_eq!(
            response.into_result().unwrap().upload_target().unwrap(),
            ("https://files.slack.com/upload/v1/abc".to_string(), "F123".to_string())
        );
        let response: SlackResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert_matches!(response.upload_target(), Err(IngestError::NotifyHttp(_)));
    }

    #[test]
    fn completion_lists_the_uploaded_file() {
        let payload: serde_json::Value =
            serde_json::from_str(&completion_payload("F123", Some("Metadata changes"))).unwrap();
        assert_eq!(payload[0]["id"], "F123");
        assert_eq!(payload[0]["title"], "Metadata changes");
        let payload: serde_json::Value =
            serde_json::from_str(&completion_payload("F9", None)).unwrap();
        assert!(payload[0].get("title").is_none());
    }
}
