use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tempfile::NamedTempFile;

use crate::error::{PluginError, Result};
use crate::model::config::CatalogConfig;
use crate::plugin::manifest::PluginDescriptor;

/// Confirmation of a finished install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReceipt {
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Fetches the remote plugin list and downloads entries into the plugin dir.
pub struct PluginInstaller {
    client: Client,
    plugin_dir: PathBuf,
}

impl PluginInstaller {
    pub fn new(config: &CatalogConfig, plugin_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| PluginError::RemoteError(format!("cannot build HTTP client: {err}")))?;

        Ok(Self::with_client(client, plugin_dir))
    }

    pub fn with_client(client: Client, plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            plugin_dir: plugin_dir.into(),
        }
    }

    /// GET the catalog. Requires HTTP 200, a JSON content type and a
    /// `[{ "name": ..., "url": ... }]` body; anything else aborts the fetch.
    pub fn fetch_catalog(&self, url: &str) -> Result<Vec<PluginDescriptor>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PluginError::RemoteError(err.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PluginError::RemoteError(format!("server returned {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/json") {
            return Err(PluginError::FormatError(content_type));
        }

        let body = response
            .bytes()
            .map_err(|err| PluginError::RemoteError(format!("failed to read body: {err}")))?;

        let catalog: Vec<PluginDescriptor> =
            serde_json::from_slice(&body).map_err(|err| PluginError::ParseError(err.to_string()))?;

        tracing::info!(url, entries = catalog.len(), "fetched plugin catalog");
        Ok(catalog)
    }

    /// Download `descriptor` into the plugin directory, replacing any file of
    /// the same name. Only the final path component of the name is used.
    ///
    /// The body is streamed into a temporary file next to the target, which
    /// replaces the target only once the whole body is on disk. A failed
    /// download leaves an existing plugin untouched.
    pub fn install_plugin(&self, descriptor: &PluginDescriptor) -> Result<InstallReceipt> {
        let file_name = sanitize_name(&descriptor.name).ok_or_else(|| PluginError::WriteError {
            path: self.plugin_dir.join(&descriptor.name),
            detail: "plugin name has no file component".to_string(),
        })?;
        if file_name != descriptor.name {
            tracing::warn!(
                requested = %descriptor.name,
                using = %file_name,
                "catalog name reduced to its base file name"
            );
        }

        let target = self.plugin_dir.join(&file_name);
        let write_error = |detail: String| PluginError::WriteError {
            path: target.clone(),
            detail,
        };
        let download_error = |detail: String| PluginError::DownloadError {
            name: descriptor.name.clone(),
            detail,
        };

        fs::create_dir_all(&self.plugin_dir).map_err(|err| PluginError::WriteError {
            path: self.plugin_dir.clone(),
            detail: err.to_string(),
        })?;

        let url = descriptor
            .source_url
            .as_deref()
            .ok_or_else(|| download_error("catalog entry has no url".to_string()))?;

        tracing::info!(plugin = %file_name, url, "downloading plugin");
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| download_error(err.to_string()))?;

        if !response.status().is_success() {
            return Err(download_error(format!(
                "server returned {}",
                response.status()
            )));
        }

        let mut file =
            NamedTempFile::new_in(&self.plugin_dir).map_err(|err| write_error(err.to_string()))?;
        let mut buf = [0u8; 8 * 1024];
        let mut bytes = 0u64;
        loop {
            let read = response
                .read(&mut buf)
                .map_err(|err| download_error(err.to_string()))?;
            if read == 0 {
                break;
            }
            file.write_all(&buf[..read])
                .map_err(|err| write_error(err.to_string()))?;
            bytes += read as u64;
        }
        file.flush().map_err(|err| write_error(err.to_string()))?;
        file.persist(&target)
            .map_err(|err| write_error(err.error.to_string()))?;

        tracing::info!(plugin = %file_name, bytes, "plugin installed");
        Ok(InstallReceipt {
            name: file_name,
            path: target,
            bytes,
        })
    }
}

fn sanitize_name(name: &str) -> Option<String> {
    // Treat both separators as path separators regardless of platform.
    let last = name.rsplit(['/', '\\']).next()?;
    Path::new(last)
        .file_name()
        .and_then(|file_name| file_name.to_str())
        .filter(|file_name| !file_name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Blocking wrapper around a `wiremock` server for catalog and download tests.

    use tokio::runtime::{Builder, Runtime};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub struct TestServer {
        // Dropped before the runtime that started it.
        server: MockServer,
        runtime: Runtime,
    }

    impl TestServer {
        pub fn start() -> Self {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("test runtime");
            let server = runtime.block_on(MockServer::start());
            Self { server, runtime }
        }

        /// Answer `GET route` with `response`. Unmounted routes get a 404.
        pub fn mount(&self, route: &str, response: ResponseTemplate) {
            self.runtime.block_on(
                Mock::given(method("GET"))
                    .and(path(route))
                    .respond_with(response)
                    .mount(&self.server),
            );
        }

        /// Answer `GET route` with a 200 and `body` of the given content type.
        pub fn body(&self, route: &str, content_type: &str, body: impl Into<Vec<u8>>) {
            self.mount(
                route,
                ResponseTemplate::new(200).set_body_raw(body.into(), content_type),
            );
        }

        pub fn url(&self, route: &str) -> String {
            format!("{}{route}", self.server.uri())
        }
    }
}
