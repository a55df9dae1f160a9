//! GitHub-backed implementation of the inspection tools for connected
//! projects. Reads the default branch through the contents API; search
//! uses code search to find candidate files, then re-scans them locally
//! so results carry real line numbers and honour the regex.

use std::path::{Component, Path};
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::glob::PathGlob;
use crate::text::{cap_lines, scan_content};
use crate::{
    InspectLimits, ListDirectoryRequest, ReadFileRequest, RepoInspector, SearchFilesRequest,
    UsageSource,
};

/// Candidate files fetched per search.
const MAX_SEARCH_FILES: usize = 20;

#[derive(Debug, Clone)]
pub struct GithubRepo {
    http: Client,
    api_base: String,
    repo_full_name: String,
    token: Option<String>,
    limits: InspectLimits,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CodeSearchResponse {
    #[serde(default)]
    items: Vec<CodeSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CodeSearchItem {
    path: String,
}

impl GithubRepo {
    pub fn new(
        api_base: &str,
        repo_full_name: &str,
        token: Option<String>,
        timeout_ms: u64,
        limits: InspectLimits,
    ) -> Result<Self, String> {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("pm-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("failed to build GitHub client: {e}"))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo_full_name: repo_full_name.to_string(),
            token,
            limits,
        })
    }

    pub fn repo_full_name(&self) -> &str {
        &self.repo_full_name
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let rb = rb.header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// `{api}/repos/{owner}/{name}/contents/{path...}` with each segment
    /// percent-encoded.
    fn contents_url(&self, path: &str) -> Result<Url, String> {
        let mut url = Url::parse(&self.api_base).map_err(|e| format!("invalid api_base: {e}"))?;
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| "api_base cannot be a base URL".to_string())?;
            segs.pop_if_empty().push("repos");
            segs.extend(self.repo_full_name.split('/'));
            segs.push("contents");
            segs.extend(clean_repo_path(path)?.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    async fn get_text(&self, url: Url, accept: &str, what: &str) -> Result<String, String> {
        let resp = self
            .decorate(self.http.get(url))
            .header("Accept", accept)
            .send()
            .await
            .map_err(|e| format!("GitHub request failed: {e}"))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| format!("GitHub response unreadable: {e}"))?;
        match status {
            s if s.is_success() => Ok(body),
            StatusCode::NOT_FOUND => Err(format!("{what} not found in {}", self.repo_full_name)),
            s => Err(format!("GitHub returned {}: {}", s.as_u16(), body.trim())),
        }
    }

    async fn fetch_raw(&self, path: &str) -> Result<String, String> {
        let url = self.contents_url(path)?;
        self.get_text(url, "application/vnd.github.raw", &format!("file '{path}'"))
            .await
    }
}

/// Normalise a repository path; rejects absolute paths and `..`.
fn clean_repo_path(path: &str) -> Result<String, String> {
    let trimmed = path.trim().trim_start_matches("./");
    if trimmed.starts_with('/') {
        return Err(format!("path '{path}' must be relative to the repository root"));
    }
    let mut parts = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(format!("path '{path}' is outside the repository")),
        }
    }
    Ok(parts.join("/"))
}

#[async_trait::async_trait]
impl RepoInspector for GithubRepo {
    fn source(&self) -> UsageSource {
        UsageSource::Github
    }

    async fn list_directory(&self, req: ListDirectoryRequest) -> Result<Value, String> {
        let url = self.contents_url(&req.path)?;
        let body = self
            .get_text(url, "application/vnd.github+json", &format!("directory '{}'", req.path))
            .await?;
        let entries: Vec<ContentEntry> = serde_json::from_str(&body)
            .map_err(|_| format!("'{}' is not a directory", req.path))?;
        let mut names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
        names.sort();

        Ok(serde_json::json!({
            "path": clean_repo_path(&req.path)?,
            "entries": names,
            "repo": self.repo_full_name,
        }))
    }

    async fn read_file(&self, req: ReadFileRequest) -> Result<Value, String> {
        let content = self.fetch_raw(&req.path).await?;
        let max = self.limits.line_cap(req.max_lines);
        let (content, omitted) = cap_lines(&content, max);

        Ok(serde_json::json!({
            "path": clean_repo_path(&req.path)?,
            "content": content,
            "truncated": omitted > 0,
            "repo": self.repo_full_name,
        }))
    }

    async fn search_files(&self, req: SearchFilesRequest) -> Result<Value, String> {
        let re = Regex::new(&req.pattern).map_err(|e| format!("invalid regex: {e}"))?;
        let glob = req.glob.as_deref().filter(|g| !g.trim().is_empty());
        let path_glob = glob
            .map(PathGlob::new)
            .transpose()
            .map_err(|e| format!("invalid glob: {e}"))?;

        let mut url = Url::parse(&format!("{}/search/code", self.api_base))
            .map_err(|e| format!("invalid api_base: {e}"))?;
        url.query_pairs_mut()
            .append_pair("q", &format!("{} repo:{}", req.pattern, self.repo_full_name))
            .append_pair("per_page", "100");
        let body = self
            .get_text(url, "application/vnd.github+json", "code search")
            .await?;
        let found: CodeSearchResponse =
            serde_json::from_str(&body).map_err(|e| format!("unexpected search response: {e}"))?;

        let mut paths: Vec<String> = found
            .items
            .into_iter()
            .map(|i| i.path)
            .filter(|p| path_glob.as_ref().map_or(true, |g| g.is_match(p)))
            .collect();
        paths.sort();
        paths.dedup();

        let mut matches = Vec::new();
        for path in paths.iter().take(MAX_SEARCH_FILES) {
            let content = match self.fetch_raw(path).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(path = %path, error = %e, "skipping search candidate");
                    continue;
                }
            };
            if scan_content(
                path,
                &content,
                &re,
                self.limits.search_max_matches,
                self.limits.search_text_max_chars,
                &mut matches,
            ) {
                break;
            }
        }

        let truncated = matches.len() >= self.limits.search_max_matches;
        Ok(serde_json::json!({
            "pattern": req.pattern,
            "glob": glob,
            "matches": matches,
            "truncated": truncated,
            "repo": self.repo_full_name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> GithubRepo {
        GithubRepo::new(
            "https://api.github.com/",
            "acme/hal-portal",
            None,
            1_000,
            InspectLimits::default(),
        )
        .unwrap()
    }

    #[test]
    fn contents_url_encodes_segments() {
        let url = repo().contents_url("docs/my notes.md").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/hal-portal/contents/docs/my%20notes.md"
        );
    }

    #[test]
    fn root_listing_has_no_trailing_segment() {
        let url = repo().contents_url(".").unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/repos/acme/hal-portal/contents");
    }

    #[test]
    fn escaping_paths_are_rejected() {
        assert!(clean_repo_path("../secrets").is_err());
        assert!(clean_repo_path("/etc/passwd").is_err());
        assert_eq!(clean_repo_path("./src/lib.rs").unwrap(), "src/lib.rs");
    }

    #[tokio::test]
    async fn invalid_regex_fails_before_network() {
        let err = repo()
            .search_files(SearchFilesRequest { pattern: "(".into(), glob: None })
            .await
            .unwrap_err();
        assert!(err.starts_with("invalid regex"));
    }
}
