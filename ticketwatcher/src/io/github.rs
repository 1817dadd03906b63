//! [`SourceHost`] over the GitHub REST API (blocking).

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::io::config::GithubConfig;
use crate::io::host::{ChangeRequest, OpenedChangeRequest, SourceHost};
use crate::io::http;

const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
    number: u64,
}

pub struct GithubHost {
    client: Client,
    repo_url: String,
}

impl GithubHost {
    pub fn new(config: &GithubConfig, token: &str, timeout: Duration) -> Result<Self> {
        let (owner, name) = config
            .repository
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "github repository must be owner/name, got {:?}",
                    config.repository
                )
            })?;
        if token.trim().is_empty() {
            return Err(anyhow!("github token is empty"));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .context("github token is not a valid header value")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        Ok(Self {
            client: http::client(timeout, headers)?,
            repo_url: format!(
                "{}/repos/{owner}/{name}",
                config.api_url.trim_end_matches('/')
            ),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}", self.repo_url, suffix.trim_start_matches('/'))
    }

    fn contents(&self, path: &str) -> String {
        self.url(&format!("contents/{}", path.trim_start_matches('/')))
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::blocking::Response> {
        let response = request.send().with_context(|| format!("send {what}"))?;
        http::ensure_success(response, what)
    }

    /// Blob sha of `path` on `branch`, if the file exists there.
    fn existing_sha(&self, path: &str, branch: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.contents(path))
            .query(&[("ref", branch)])
            .send()
            .with_context(|| format!("send lookup of {path}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = http::ensure_success(response, "file lookup")?
            .json()
            .context("parse file lookup response")?;
        Ok(body.get("sha").and_then(Value::as_str).map(str::to_string))
    }
}

/// Decode the `content` field of a contents-API file object.
///
/// Directory listings (arrays) and non-file objects yield `None`.
fn decode_contents(body: &Value) -> Result<Option<String>> {
    let Some(encoded) = body.get("content").and_then(Value::as_str) else {
        return Ok(None);
    };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .context("decode base64 file content")?;
    let text = String::from_utf8(bytes).context("file content is not UTF-8")?;
    Ok(Some(text))
}

impl SourceHost for GithubHost {
    fn default_branch(&self) -> Result<String> {
        let repo: RepoInfo = self
            .send(self.client.get(&self.repo_url), "repository lookup")?
            .json()
            .context("parse repository response")?;
        Ok(repo.default_branch)
    }

    fn head_revision(&self, branch: &str) -> Result<String> {
        let git_ref: GitRef = self
            .send(
                self.client.get(self.url(&format!("git/ref/heads/{branch}"))),
                "branch lookup",
            )?
            .json()
            .context("parse branch ref response")?;
        Ok(git_ref.object.sha)
    }

    #[instrument(skip_all, fields(branch = %name))]
    fn create_branch(&self, name: &str, from_revision: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("git/refs"))
            .json(&json!({ "ref": format!("refs/heads/{name}"), "sha": from_revision }))
            .send()
            .context("send branch creation")?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().unwrap_or_default();
            if body.contains("Reference already exists") {
                debug!("branch already exists");
                return Ok(());
            }
            return Err(anyhow!(
                "branch creation failed: HTTP 422: {}",
                http::sanitize_error_body(&body)
            ));
        }
        http::ensure_success(response, "branch creation")?;
        info!("branch created");
        Ok(())
    }

    fn read_file(&self, path: &str, revision: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.contents(path))
            .query(&[("ref", revision)])
            .send()
            .with_context(|| format!("send read of {path}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = http::ensure_success(response, "file read")?
            .json()
            .context("parse file read response")?;
        decode_contents(&body).with_context(|| format!("read {path}@{revision}"))
    }

    fn file_exists(&self, path: &str, revision: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.contents(path))
            .query(&[("ref", revision)])
            .send()
            .with_context(|| format!("send existence check of {path}"))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => http::ensure_success(response, "file existence check").map(|_| true),
        }
    }

    #[instrument(skip_all, fields(path = %path, branch = %branch))]
    fn write_file(&self, path: &str, text: &str, message: &str, branch: &str) -> Result<()> {
        let mut payload = json!({
            "message": message,
            "content": STANDARD.encode(text.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = self.existing_sha(path, branch)? {
            payload["sha"] = Value::String(sha);
        }
        self.send(self.client.put(self.contents(path)).json(&payload), "file write")?;
        info!(bytes = text.len(), "file written");
        Ok(())
    }

    #[instrument(skip_all, fields(head = %request.head, base = %request.base))]
    fn open_change_request(&self, request: &ChangeRequest) -> Result<OpenedChangeRequest> {
        let payload = json!({
            "title": request.title,
            "head": request.head,
            "base": request.base,
            "body": request.body,
            "draft": request.draft,
        });
        let pr: PullRequest = self
            .send(self.client.post(self.url("pulls")).json(&payload), "pull request creation")?
            .json()
            .context("parse pull request response")?;
        info!(number = pr.number, url = %pr.html_url, "pull request opened");
        Ok(OpenedChangeRequest {
            url: pr.html_url,
            number: pr.number,
        })
    }

    fn add_comment(&self, item: u64, text: &str) -> Result<()> {
        self.send(
            self.client
                .post(self.url(&format!("issues/{item}/comments")))
                .json(&json!({ "body": text })),
            "comment creation",
        )?;
        Ok(())
    }

    fn add_labels(&self, item: u64, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        self.send(
            self.client
                .post(self.url(&format!("issues/{item}/labels")))
                .json(&json!({ "labels": labels })),
            "label update",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(repository: &str) -> GithubConfig {
        GithubConfig {
            api_url: "https://api.github.com/".to_string(),
            repository: repository.to_string(),
        }
    }

    #[test]
    fn builds_repo_scoped_urls() {
        let host =
            GithubHost::new(&config("acme/widgets"), "t0ken", Duration::from_secs(5)).expect("host");
        assert_eq!(
            host.url("pulls"),
            "https://api.github.com/repos/acme/widgets/pulls"
        );
        assert_eq!(
            host.contents("/src/app.py"),
            "https://api.github.com/repos/acme/widgets/contents/src/app.py"
        );
    }

    #[test]
    fn rejects_malformed_repository_and_empty_token() {
        assert!(GithubHost::new(&config("widgets"), "t", Duration::from_secs(5)).is_err());
        assert!(GithubHost::new(&config("/widgets"), "t", Duration::from_secs(5)).is_err());
        assert!(GithubHost::new(&config("acme/widgets"), "", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn decodes_wrapped_base64_content() {
        // GitHub wraps base64 content at 60 columns.
        let body = json!({ "type": "file", "content": "ZGVmIGYoKToK\ncmV0dXJuIDEK\n" });
        assert_eq!(
            decode_contents(&body).expect("decode").as_deref(),
            Some("def f():\nreturn 1\n")
        );
    }

    #[test]
    fn directory_listing_is_not_a_file() {
        let body = json!([{ "type": "file", "name": "a.py" }]);
        assert_eq!(decode_contents(&body).expect("decode"), None);
    }
}
