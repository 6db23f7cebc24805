// Blocking HTTP client for the image archive.
//
// Read-only surface:
//   GET /instances/{id}/image-uint16      16-bit greyscale PNG
//   GET /series/{id}/instances            JSON instance listing
//   GET /instances/{id}/content/{tag}     one DICOM tag as text
// One client is built up front and shared by every worker thread.

use std::time::Duration;

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::formats::series::parse_series_listing;
use crate::formats::slice::PngFetcher;
use crate::kernel::SliceHandle;

/// The few tags the viewer shows in its title line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DicomTag {
    PatientName,
    PatientId,
    StudyDescription,
}

impl DicomTag {
    pub const fn path(self) -> &'static str {
        match self {
            DicomTag::PatientName => "0010-0010",
            DicomTag::PatientId => "0010-0020",
            DicomTag::StudyDescription => "0008-1030",
        }
    }
}

pub struct ArchiveClient {
    base: String,
    http: reqwest::blocking::Client,
}

impl ArchiveClient {
    pub fn new(config: &ArchiveConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Fetch {
                url: config.url.clone(),
                reason: format!("HTTP client error: {e}"),
            })?;
        Ok(Self {
            base: config.url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn get(&self, path: &str) -> Result<reqwest::blocking::Response> {
        let url = format!("{}{}", self.base, path);
        let fetch_error = |reason: String| Error::Fetch {
            url: url.clone(),
            reason,
        };
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(response.status().to_string()));
        }
        Ok(response)
    }

    fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let response = self.get(path)?;
        let url = response.url().to_string();
        let bytes = response.bytes().map_err(|e| Error::Fetch {
            url,
            reason: format!("body: {e}"),
        })?;
        Ok(bytes.to_vec())
    }

    fn get_text(&self, path: &str) -> Result<String> {
        let response = self.get(path)?;
        let url = response.url().to_string();
        response.text().map_err(|e| Error::Fetch {
            url,
            reason: format!("body: {e}"),
        })
    }

    pub fn fetch_png(&self, instance: &str) -> Result<Vec<u8>> {
        let png = self.get_bytes(&format!("/instances/{instance}/image-uint16"))?;
        log::debug!("archive: {} -> {} bytes", instance, png.len());
        Ok(png)
    }

    /// Slice handles for a series, ordered by IndexInSeries.
    pub fn series_slices(&self, series: &str) -> Result<Vec<SliceHandle>> {
        let listing = self.get_text(&format!("/series/{series}/instances"))?;
        let handles = parse_series_listing(&listing)?;
        log::info!("archive: series {} has {} slice(s)", series, handles.len());
        Ok(handles)
    }

    pub fn instance_tag(&self, instance: &str, tag: DicomTag) -> Result<String> {
        let value = self.get_text(&format!("/instances/{instance}/content/{}", tag.path()))?;
        Ok(value.trim_end_matches(['\0', ' ', '\n', '\r']).to_string())
    }

    /// "name (id) - description", skipping whatever the archive lacks.
    pub fn title(&self, instance: &str) -> String {
        let tag = |t| match self.instance_tag(instance, t) {
            Ok(v) if !v.is_empty() => Some(v),
            Ok(_) => None,
            Err(e) => {
                log::debug!("archive: {}", e);
                None
            }
        };
        let mut title = tag(DicomTag::PatientName).unwrap_or_default();
        if let Some(id) = tag(DicomTag::PatientId) {
            if !title.is_empty() {
                title.push(' ');
            }
            title.push_str(&format!("({id})"));
        }
        if let Some(desc) = tag(DicomTag::StudyDescription) {
            if !title.is_empty() {
                title.push_str(" - ");
            }
            title.push_str(&desc);
        }
        title
    }
}

impl PngFetcher for ArchiveClient {
    fn fetch_png(&self, instance: &str) -> Result<Vec<u8>> {
        ArchiveClient::fetch_png(self, instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let config = ArchiveConfig {
            url: "http://archive:8042/".into(),
            ..ArchiveConfig::default()
        };
        let client = ArchiveClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://archive:8042");
    }

    #[test]
    fn unreachable_archive_is_fetch_error() {
        let config = ArchiveConfig {
            // reserved port on loopback; nothing listens there
            url: "http://127.0.0.1:9".into(),
            timeout_ms: 2000,
            ..ArchiveConfig::default()
        };
        let client = ArchiveClient::new(&config).unwrap();
        match client.fetch_png("abc") {
            Err(Error::Fetch { url, .. }) => {
                assert_eq!(url, "http://127.0.0.1:9/instances/abc/image-uint16")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tag_paths() {
        assert_eq!(DicomTag::PatientName.path(), "0010-0010");
        assert_eq!(DicomTag::StudyDescription.path(), "0008-1030");
    }
}
