//! Worker pool coordinator tests: bounded parallelism, shard isolation,
//! idempotent re-runs, and stop handling.

use crate::fetcher::test_helpers::{
    FakeProvider, create_test_fetcher, read_provenance, success,
};
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0 not a real jpeg";

fn numbered_rows(n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| (format!("cap{i}"), format!("http://a.test/{i}.jpg")))
        .collect()
}

fn as_pairs(rows: &[(String, String)]) -> Vec<(&str, &str)> {
    rows.iter()
        .map(|(c, u)| (c.as_str(), u.as_str()))
        .collect()
}

fn provider_for(rows: &[(String, String)]) -> FakeProvider {
    let mut provider = FakeProvider::new();
    for (_, url) in rows {
        provider = provider.respond(url, success(JPEG_BYTES));
    }
    provider
}

#[tokio::test]
async fn run_processes_every_shard_and_reports_totals() {
    let rows = numbered_rows(6);
    let (fetcher, _provider, _temp_dir) =
        create_test_fetcher(&as_pairs(&rows), 3, provider_for(&rows));

    let report = fetcher.run().await.unwrap();

    assert_eq!(report.shards_completed, 3);
    assert_eq!(report.shards_failed, 0);
    assert!(!report.cancelled);
    assert_eq!(report.totals.downloaded, 6);

    let config = fetcher.get_config();
    for shard in 0..3 {
        let files: Vec<_> = std::fs::read_dir(config.image_dir.join(shard.to_string()))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 2, "each shard owns two of the six rows");
        assert_eq!(read_provenance(&config, shard).len(), 2);
    }
}

#[tokio::test]
async fn active_workers_never_exceed_max_parallel() {
    let rows = numbered_rows(8);
    let provider = provider_for(&rows).with_delay(Duration::from_millis(30));
    // One row per shard, so concurrent fetches equal active workers
    let (fetcher, provider, _temp_dir) = create_test_fetcher(&as_pairs(&rows), 8, provider);
    // test_config sets max_parallel = 3
    fetcher.run().await.unwrap();

    let peak = provider.peak_in_flight.load(Ordering::SeqCst);
    assert!(
        peak <= 3,
        "observed {peak} concurrent fetches with max_parallel = 3"
    );
    assert_eq!(provider.fetch_count.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn second_run_downloads_nothing_and_leaves_the_tree_unchanged() {
    let rows = numbered_rows(4);
    let (fetcher, provider, _temp_dir) =
        create_test_fetcher(&as_pairs(&rows), 2, provider_for(&rows));

    let first = fetcher.run().await.unwrap();
    assert_eq!(first.totals.downloaded, 4);
    let fetches_after_first = provider.fetch_count.load(Ordering::SeqCst);

    let config = fetcher.get_config();
    let tree = |root: &std::path::Path| {
        let mut paths: Vec<_> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .collect();
        paths.sort();
        paths
    };
    let tree_after_first = tree(&config.image_dir);

    let second = fetcher.run().await.unwrap();
    assert_eq!(second.totals.skipped, 4);
    assert_eq!(second.totals.downloaded, 0);
    assert_eq!(
        provider.fetch_count.load(Ordering::SeqCst),
        fetches_after_first,
        "a re-run must not touch the network"
    );
    assert_eq!(tree(&config.image_dir), tree_after_first);

    // Successful-path provenance is identical across runs
    for shard in 0..2 {
        let lines = read_provenance(&config, shard);
        assert_eq!(lines.len(), 2);
    }
}

#[tokio::test]
async fn failing_shard_does_not_disturb_the_others() {
    let rows = numbered_rows(4);
    let temp_dir = tempfile::tempdir().unwrap();
    let config =
        crate::fetcher::test_helpers::test_config(temp_dir.path(), &as_pairs(&rows), 2);

    // Block shard 1's output directory with a plain file
    std::fs::create_dir_all(&config.image_dir).unwrap();
    std::fs::write(config.image_dir.join("1"), b"in the way").unwrap();

    let provider = std::sync::Arc::new(provider_for(&rows));
    let fetcher =
        crate::fetcher::DatasetFetcher::with_provider(config, provider.clone()).unwrap();
    let mut events = fetcher.subscribe();

    let report = fetcher.run().await.unwrap();

    assert_eq!(report.shards_completed, 1);
    assert_eq!(report.shards_failed, 1);
    assert_eq!(report.totals.downloaded, 2, "shard 0 still runs to completion");

    let mut saw_shard_failed = false;
    while let Ok(event) = events.try_recv() {
        if let Event::ShardFailed { shard, .. } = event {
            assert_eq!(shard.get(), 1);
            saw_shard_failed = true;
        }
    }
    assert!(saw_shard_failed, "ShardFailed event must be emitted");
}

#[tokio::test]
async fn stop_requested_before_run_starts_no_workers() {
    let rows = numbered_rows(4);
    let (fetcher, provider, _temp_dir) =
        create_test_fetcher(&as_pairs(&rows), 2, provider_for(&rows));

    fetcher.request_stop();
    let report = fetcher.run().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.shards_completed, 0);
    assert_eq!(provider.fetch_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn more_shards_than_rows_yields_empty_trailing_shards() {
    let rows = numbered_rows(2);
    let (fetcher, _provider, _temp_dir) =
        create_test_fetcher(&as_pairs(&rows), 4, provider_for(&rows));

    let report = fetcher.run().await.unwrap();

    assert_eq!(report.shards_completed, 4);
    assert_eq!(report.totals.downloaded, 2);

    let config = fetcher.get_config();
    assert!(read_provenance(&config, 2).is_empty());
    assert!(read_provenance(&config, 3).is_empty());
}

#[tokio::test]
async fn planning_mismatch_aborts_before_any_worker_starts() {
    let rows = numbered_rows(5);
    let mut provider = FakeProvider::new();
    for (_, url) in &rows {
        provider = provider.respond(url, success(JPEG_BYTES));
    }

    let temp_dir = tempfile::tempdir().unwrap();
    let mut config =
        crate::fetcher::test_helpers::test_config(temp_dir.path(), &as_pairs(&rows), 2);
    config.expected_rows = 4; // one fewer than the dataset actually holds

    let provider = std::sync::Arc::new(provider);
    let fetcher =
        crate::fetcher::DatasetFetcher::with_provider(config, provider.clone()).unwrap();

    let err = fetcher.run().await.unwrap_err();
    assert!(
        matches!(err, crate::error::Error::Plan(_)),
        "expected a planning error, got: {err:?}"
    );
    assert_eq!(
        provider.fetch_count.load(Ordering::SeqCst),
        0,
        "no fetch may happen when planning fails"
    );
}
