//! HTTPS client for a Maven-compatible package registry.

use std::io::Write;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::contract::Registry;
use crate::error::{AutomationError, Result};
use crate::model::Coordinate;

pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";

static VERSION_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\s[^>]*href="(\d+\.\d+\.\d+)/?""#).expect("static regex")
});

pub struct MavenRegistry {
    client: Client,
    base_url: String,
}

impl MavenRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `<base>/<group-path>/<artifact>`
    pub fn artifact_url(&self, coordinate: &Coordinate) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            coordinate.group_path(),
            coordinate.artifact
        )
    }

    /// `<base>/<group-path>/<artifact>/<version>/<artifact>-<version>.jar`
    pub fn binary_url(&self, coordinate: &Coordinate, version: &str) -> String {
        format!(
            "{}/{version}/{}-{version}.jar",
            self.artifact_url(coordinate),
            coordinate.artifact
        )
    }
}

/// Versions named by anchors of a directory listing, in listing order.
pub fn parse_version_index(html: &str) -> Vec<String> {
    let mut versions: Vec<String> = Vec::new();
    for caps in VERSION_HREF_RE.captures_iter(html) {
        let version = caps[1].to_string();
        if !versions.contains(&version) {
            versions.push(version);
        }
    }
    versions
}

#[async_trait]
impl Registry for MavenRegistry {
    async fn fetch_binary(&self, coordinate: &Coordinate, version: &str) -> Result<NamedTempFile> {
        let url = self.binary_url(coordinate, version);
        info!(url = %url, "[REGISTRY] Fetching published binary");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(error = ?e, url = %url, "[REGISTRY] Request failed");
            AutomationError::Http(e)
        })?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            warn!(status = %status, url = %url, "[REGISTRY] Binary not available");
            return Err(AutomationError::RegistryNotFound {
                coordinate: coordinate.to_string(),
                version: version.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-{version}-", coordinate.artifact))
            .suffix(".jar")
            .tempfile()
            .map_err(|e| AutomationError::io(std::env::temp_dir(), e))?;
        file.write_all(&bytes)
            .map_err(|e| AutomationError::io(file.path().to_path_buf(), e))?;
        debug!(
            path = %file.path().display(),
            size = bytes.len(),
            "[REGISTRY] Binary stored in temp file"
        );
        Ok(file)
    }

    async fn list_versions(&self, coordinate: &Coordinate) -> Result<Vec<String>> {
        let url = format!("{}/", self.artifact_url(coordinate));
        info!(url = %url, "[REGISTRY] Listing published versions");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %url, "[REGISTRY] Version index not available");
            return Err(AutomationError::RegistryNotFound {
                coordinate: coordinate.to_string(),
                version: "*".to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        let versions = parse_version_index(&body);
        debug!(count = versions.len(), coordinate = %coordinate, "[REGISTRY] Parsed version index");
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_maven_layout() {
        let registry = MavenRegistry::new("https://repo.example.org/maven2/");
        let coord = Coordinate::new("com.azure.resourcemanager", "azure-resourcemanager-foo");
        assert_eq!(
            registry.artifact_url(&coord),
            "https://repo.example.org/maven2/com/azure/resourcemanager/azure-resourcemanager-foo"
        );
        assert_eq!(
            registry.binary_url(&coord, "1.1.0"),
            "https://repo.example.org/maven2/com/azure/resourcemanager/azure-resourcemanager-foo/1.1.0/azure-resourcemanager-foo-1.1.0.jar"
        );
    }

    #[test]
    fn version_index_keeps_only_numeric_triples() {
        let html = r#"<html><body><pre>
<a href="../">../</a>
<a href="1.0.0/" title="1.0.0/">1.0.0/</a>   2023-01-01 00:00  -
<a href="1.1.0/" title="1.1.0/">1.1.0/</a>   2023-06-01 00:00  -
<a href="1.2.0-beta.1/" title="1.2.0-beta.1/">1.2.0-beta.1/</a>
<a href="maven-metadata.xml" title="maven-metadata.xml">maven-metadata.xml</a>
<a href="1.1.0/">duplicate</a>
</pre></body></html>"#;
        assert_eq!(parse_version_index(html), vec!["1.0.0", "1.1.0"]);
    }
}
