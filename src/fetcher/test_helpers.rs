//! Shared test helpers for creating DatasetFetcher instances and scripted
//! media providers in tests.

use crate::config::Config;
use crate::error::FetchError;
use crate::fetcher::{DatasetFetcher, FetchedMedia, MediaProvider};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Canned response for one URL served by a [`FakeProvider`]
pub(crate) enum FakeResponse {
    Success {
        bytes: Vec<u8>,
        content_type: Option<String>,
        filename_hint: Option<String>,
    },
    Failure,
}

/// Plain success with a body and no response metadata
pub(crate) fn success(bytes: &[u8]) -> FakeResponse {
    FakeResponse::Success {
        bytes: bytes.to_vec(),
        content_type: None,
        filename_hint: None,
    }
}

/// Success carrying a Content-Type declaration
pub(crate) fn success_with_content_type(bytes: &[u8], content_type: &str) -> FakeResponse {
    FakeResponse::Success {
        bytes: bytes.to_vec(),
        content_type: Some(content_type.to_string()),
        filename_hint: None,
    }
}

/// Scripted [`MediaProvider`]: a URL-to-response map plus counters the
/// test can assert on. URLs with no canned response fail like a network
/// error would.
#[derive(Default)]
pub(crate) struct FakeProvider {
    responses: HashMap<String, FakeResponse>,
    delay: Option<Duration>,
    cancel_after: Option<(usize, CancellationToken)>,
    /// Total fetch() calls observed
    pub(crate) fetch_count: AtomicUsize,
    in_flight: AtomicUsize,
    /// Highest number of concurrent fetch() calls observed
    pub(crate) peak_in_flight: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `url`
    pub(crate) fn respond(mut self, url: &str, response: FakeResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    /// Sleep inside every fetch, to make concurrency observable
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cancel `token` during the `nth` fetch (1-based), modeling an
    /// interrupt arriving while a row is in flight
    pub(crate) fn cancel_during_fetch(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((nth, token));
        self
    }
}

#[async_trait::async_trait]
impl MediaProvider for FakeProvider {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError> {
        let call = self.fetch_count.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((nth, token)) = &self.cancel_after
            && call >= *nth
        {
            token.cancel();
        }

        let result = match self.responses.get(url) {
            Some(FakeResponse::Success {
                bytes,
                content_type,
                filename_hint,
            }) => Ok(FetchedMedia {
                bytes: bytes.clone(),
                content_type: content_type.clone(),
                filename_hint: filename_hint.clone(),
            }),
            Some(FakeResponse::Failure) | None => Err(FetchError::Io(std::io::Error::other(
                format!("no canned response for {url}"),
            ))),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Write a `(caption, url)` TSV into `dir` and return a matching config
/// rooted there, with `expected_rows` set to the actual row count.
pub(crate) fn test_config(dir: &Path, rows: &[(&str, &str)], shard_count: usize) -> Config {
    let dataset_path = dir.join("data.tsv");
    let mut file = std::fs::File::create(&dataset_path).unwrap();
    for (caption, url) in rows {
        writeln!(file, "{caption}\t{url}").unwrap();
    }

    Config {
        dataset_path,
        image_dir: dir.join("images"),
        correspondance_dir: dir.join("correspondance"),
        shard_count,
        max_parallel: 3,
        expected_rows: rows.len(),
        ..Default::default()
    }
}

/// Helper to create a test DatasetFetcher over a scripted provider.
/// Returns the fetcher, the provider (for counter assertions), and the
/// tempdir (which must be kept alive).
pub(crate) fn create_test_fetcher(
    rows: &[(&str, &str)],
    shard_count: usize,
    provider: FakeProvider,
) -> (DatasetFetcher, Arc<FakeProvider>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path(), rows, shard_count);
    let provider = Arc::new(provider);
    let fetcher = DatasetFetcher::with_provider(config, provider.clone()).unwrap();
    (fetcher, provider, temp_dir)
}

/// Read one shard's provenance file as a list of lines
pub(crate) fn read_provenance(config: &Config, shard: usize) -> Vec<String> {
    let path = config
        .correspondance_dir
        .join(format!("{}.part-{shard}.tsv", config.dataset_stem()));
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
