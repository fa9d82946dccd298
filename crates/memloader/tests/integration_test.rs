//! Integration tests for memloader

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use prost::Message;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use memloader::config::{Config, EncodeFailurePolicy, StoreConfig};
use memloader::error::{EncodingError, PipelineError};
use memloader::pipeline::{FileOutcome, FilePipeline};
use memloader::record::{CompositeKey, Record, RecordEncoder, UserApps};
use memloader::sink::{MemoryStore, StoreRegistry, StoreWriter};
use memloader::source::CompressionFormat;

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn write_gz(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, gzip(text)).unwrap();
    path
}

fn config_for(dir: &Path, suffix: &str) -> Config {
    let mut config = Config::default();
    config.source.pattern = format!("{}/*{suffix}", dir.display());
    config
}

/// Minimal memcached speaking just enough of the text protocol for `set`.
struct FakeMemcached {
    address: String,
    values: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl FakeMemcached {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let values = Arc::new(Mutex::new(HashMap::new()));

        let shared = values.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let values = shared.clone();
                tokio::spawn(async move {
                    let (read, mut write) = socket.into_split();
                    let mut reader = BufReader::new(read);
                    let mut header = String::new();
                    loop {
                        header.clear();
                        if reader.read_line(&mut header).await.unwrap_or(0) == 0 {
                            return;
                        }
                        let parts: Vec<&str> = header.split_whitespace().collect();
                        let [_, key, _, _, len] = parts.as_slice() else {
                            return;
                        };
                        let len: usize = len.parse().unwrap();
                        let mut data = vec![0u8; len + 2];
                        reader.read_exact(&mut data).await.unwrap();
                        data.truncate(len);
                        values.lock().unwrap().insert(key.to_string(), data);
                        write.write_all(b"STORED\r\n").await.unwrap();
                    }
                });
            }
        });

        Self { address, values }
    }

    fn get(&self, key: &str) -> Option<UserApps> {
        let values = self.values.lock().unwrap();
        values
            .get(key)
            .map(|bytes| UserApps::decode(bytes.as_slice()).unwrap())
    }

    fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }
}

fn lines(valid: usize, invalid: usize) -> String {
    let mut text = String::new();
    for i in 0..valid {
        text.push_str(&format!("idfa\tdev{i}\t55.55\t37.37\t1,2,3\n"));
    }
    for _ in 0..invalid {
        text.push_str("idfa\tbroken\n");
    }
    text
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn test_load_into_memcached() {
        let idfa = FakeMemcached::start().await;
        let gaid = FakeMemcached::start().await;
        let dir = tempfile::tempdir().unwrap();
        write_gz(
            dir.path(),
            "20170929000000.tsv.gz",
            "idfa\t1234\t55.55\t37.37\t42,43,44\n\
             gaid\tabcd\t-12.5\t100.25\t7\n\
             idfa\t5678\t0\t0\t\n",
        );

        let mut config = config_for(dir.path(), ".tsv.gz");
        config.stores.clear();
        config
            .stores
            .insert("idfa".to_string(), StoreConfig::new(&idfa.address));
        config
            .stores
            .insert("gaid".to_string(), StoreConfig::new(&gaid.address));

        let registry = StoreRegistry::from_config(&config.stores);
        let summary = FilePipeline::new(&config, registry).run().await.unwrap();

        assert_eq!(summary.files_committed, 1);
        assert_eq!(summary.lines_processed, 3);
        assert_eq!(summary.line_errors, 0);
        assert_eq!(idfa.len(), 2);
        assert_eq!(gaid.len(), 1);

        let apps = idfa.get("idfa:1234").unwrap();
        assert_eq!(apps.apps, vec![42, 43, 44]);
        assert_eq!(apps.lat, Some(55.55));
        assert_eq!(apps.lon, Some(37.37));
        assert!(idfa.get("idfa:5678").unwrap().apps.is_empty());
        assert_eq!(gaid.get("gaid:abcd").unwrap().lon, Some(100.25));

        assert!(dir.path().join(".20170929000000.tsv.gz").exists());
        assert!(!dir.path().join("20170929000000.tsv.gz").exists());
    }

    #[tokio::test]
    async fn test_unreachable_store_retains_file() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let path = write_gz(dir.path(), "a.tsv.gz", &lines(5, 0));

        let mut config = config_for(dir.path(), ".tsv.gz");
        config.stores.clear();
        let mut store = StoreConfig::new(address);
        store.timeout_ms = 200;
        config.stores.insert("idfa".to_string(), store);

        let registry = StoreRegistry::from_config(&config.stores);
        let summary = FilePipeline::new(&config, registry).run().await.unwrap();

        assert_eq!(summary.files_retained, 1);
        assert_eq!(summary.line_errors, 5);
        assert_eq!(summary.reports[0].stats.failures.write, 5);
        assert!(path.exists());
    }
}

mod error_rate_gate {
    use super::*;

    async fn run_one(text: &str) -> (FileOutcome, f64, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        write_gz(dir.path(), "a.tsv.gz", text);
        let registry = StoreRegistry::new().with_store("idfa", Arc::new(MemoryStore::new("idfa")));

        let summary = FilePipeline::new(&config_for(dir.path(), ".tsv.gz"), registry)
            .run()
            .await
            .unwrap();
        let report = summary.reports.into_iter().next().unwrap();
        (report.outcome, report.stats.error_rate, dir)
    }

    #[tokio::test]
    async fn test_half_percent_errors_commits() {
        let (outcome, rate, dir) = run_one(&lines(995, 5)).await;
        assert_eq!(rate, 0.005);
        assert!(matches!(outcome, FileOutcome::Committed { .. }));
        assert!(dir.path().join(".a.tsv.gz").exists());
    }

    #[tokio::test]
    async fn test_exactly_threshold_commits() {
        let (outcome, rate, _dir) = run_one(&lines(990, 10)).await;
        assert_eq!(rate, 0.01);
        assert!(matches!(outcome, FileOutcome::Committed { .. }));
    }

    #[tokio::test]
    async fn test_two_percent_errors_retains() {
        let (outcome, rate, dir) = run_one(&lines(980, 20)).await;
        assert_eq!(rate, 0.02);
        assert_eq!(outcome, FileOutcome::Retained);
        assert!(dir.path().join("a.tsv.gz").exists());
    }

    #[tokio::test]
    async fn test_retained_file_is_fully_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(dir.path(), "a.tsv.gz", &lines(10, 5));
        let store = Arc::new(MemoryStore::new("idfa"));
        let config = config_for(dir.path(), ".tsv.gz");

        for _ in 0..2 {
            let registry = StoreRegistry::new().with_store("idfa", store.clone());
            let summary = FilePipeline::new(&config, registry).run().await.unwrap();
            assert_eq!(summary.files_retained, 1);
            assert_eq!(summary.lines_processed, 15);
        }
        assert_eq!(store.attempts(), 20);
        assert_eq!(store.len(), 10);
    }
}

mod discovery {
    use super::*;

    #[tokio::test]
    async fn test_marked_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(dir.path(), ".done.tsv.gz", &lines(3, 0));
        write_gz(dir.path(), "todo.tsv.gz", &lines(2, 0));
        let store = Arc::new(MemoryStore::new("idfa"));
        let registry = StoreRegistry::new().with_store("idfa", store.clone());

        let summary = FilePipeline::new(&config_for(dir.path(), ".tsv.gz"), registry)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.files_committed, 1);
        assert_eq!(summary.lines_processed, 2);
        assert_eq!(store.attempts(), 2);
    }

    #[tokio::test]
    async fn test_second_run_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(dir.path(), "a.tsv.gz", &lines(3, 0));
        let config = config_for(dir.path(), ".tsv.gz");

        let registry = StoreRegistry::new().with_store("idfa", Arc::new(MemoryStore::new("idfa")));
        let first = FilePipeline::new(&config, registry.clone())
            .run()
            .await
            .unwrap();
        let second = FilePipeline::new(&config, registry).run().await.unwrap();

        assert_eq!(first.files_committed, 1);
        assert_eq!(second, Default::default());
    }

    #[tokio::test]
    async fn test_no_matches_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let summary = FilePipeline::new(&config_for(dir.path(), ".tsv.gz"), StoreRegistry::new())
            .run()
            .await
            .unwrap();
        assert!(summary.reports.is_empty());
    }

    #[tokio::test]
    async fn test_zstd_input() {
        let dir = tempfile::tempdir().unwrap();
        let data = zstd::encode_all(lines(4, 0).as_bytes(), 3).unwrap();
        std::fs::write(dir.path().join("a.tsv.zst"), data).unwrap();

        let mut config = config_for(dir.path(), ".tsv.zst");
        config.source.compression = CompressionFormat::Zstd;
        let store = Arc::new(MemoryStore::new("idfa"));
        let registry = StoreRegistry::new().with_store("idfa", store.clone());

        let summary = FilePipeline::new(&config, registry).run().await.unwrap();
        assert_eq!(summary.files_committed, 1);
        assert_eq!(store.len(), 4);
    }
}

mod fatal_errors {
    use super::*;

    #[tokio::test]
    async fn test_corrupt_file_stops_run_before_later_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tsv.gz"), b"definitely not gzip").unwrap();
        let later = write_gz(dir.path(), "b.tsv.gz", &lines(1, 0));
        let store = Arc::new(MemoryStore::new("idfa"));
        let registry = StoreRegistry::new().with_store("idfa", store.clone());

        let err = FilePipeline::new(&config_for(dir.path(), ".tsv.gz"), registry)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Source { .. }));
        assert!(later.exists());
        assert_eq!(store.attempts(), 0);
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let mut config = Config::default();
        config.source.pattern = "data/[*.tsv.gz".to_string();
        let err = FilePipeline::new(&config, StoreRegistry::new())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Source { .. }));
    }
}

mod broken_streams {
    use super::*;

    #[tokio::test]
    async fn test_truncated_gzip_is_retained_and_later_files_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = gzip(&lines(200, 0));
        data.truncate(data.len() / 2);
        let broken = dir.path().join("a.tsv.gz");
        std::fs::write(&broken, data).unwrap();
        write_gz(dir.path(), "b.tsv.gz", "idfa\tok\t1.0\t2.0\t9\n");
        let store = Arc::new(MemoryStore::new("idfa"));
        let registry = StoreRegistry::new().with_store("idfa", store.clone());

        let summary = FilePipeline::new(&config_for(dir.path(), ".tsv.gz"), registry)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.reports[0].outcome, FileOutcome::StreamFailed);
        assert_eq!(summary.files_retained, 1);
        assert!(broken.exists());
        assert!(!dir.path().join(".a.tsv.gz").exists());

        assert_eq!(summary.files_committed, 1);
        assert!(store.get("idfa:ok").is_some());
        assert!(dir.path().join(".b.tsv.gz").exists());
    }
}

mod encode_failures {
    use super::*;
    use memloader::error::EncodeSnafu;
    use snafu::ResultExt;

    struct RefusingEncoder;

    impl RecordEncoder for RefusingEncoder {
        fn encode(&self, key: &CompositeKey, record: &Record) -> Result<Bytes, EncodingError> {
            let mut full: &mut [u8] = &mut [];
            UserApps::from(record)
                .encode(&mut full)
                .context(EncodeSnafu { key: key.as_str() })?;
            Ok(Bytes::new())
        }

        fn describe(&self, _key: &CompositeKey, _value: &[u8]) -> Result<String, EncodingError> {
            Ok(String::new())
        }
    }

    fn pipeline(dir: &Path, policy: EncodeFailurePolicy) -> FilePipeline {
        let mut config = config_for(dir, ".tsv.gz");
        config.error_handling.on_encode_failure = policy;
        let registry = StoreRegistry::new().with_store("idfa", Arc::new(MemoryStore::new("idfa")));
        FilePipeline::new(&config, registry)
            .with_writer(StoreWriter::new(Box::new(RefusingEncoder), false))
    }

    fn record_with_apps() -> String {
        "idfa\t1\t1.0\t2.0\t1,2,3\n".to_string()
    }

    #[tokio::test]
    async fn test_abort_policy_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gz(dir.path(), "a.tsv.gz", &record_with_apps());

        let err = pipeline(dir.path(), EncodeFailurePolicy::Abort)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Encoding { .. }));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_skip_policy_counts_error() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(dir.path(), "a.tsv.gz", &record_with_apps());

        let summary = pipeline(dir.path(), EncodeFailurePolicy::Skip)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.files_retained, 1);
        assert_eq!(summary.reports[0].stats.failures.encode, 1);
    }
}

mod dry_run {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_writes_nothing_and_counts_the_same() {
        let dir = tempfile::tempdir().unwrap();
        write_gz(dir.path(), "a.tsv.gz", &lines(99, 1));
        let store = Arc::new(MemoryStore::new("idfa"));
        let mut config = config_for(dir.path(), ".tsv.gz");
        config.dry_run = true;

        let registry = StoreRegistry::new().with_store("idfa", store.clone());
        let pipeline = FilePipeline::new(&config, registry);
        let summary = pipeline.run().await.unwrap();

        assert_eq!(store.attempts(), 0);
        assert_eq!(pipeline.writer().dry_run_writes(), 99);
        assert_eq!(summary.lines_processed, 100);
        assert_eq!(summary.line_errors, 1);
        assert_eq!(summary.files_committed, 1);
    }
}

mod entry_point {
    use super::*;
    use memloader::run_loader;

    #[tokio::test]
    async fn test_run_loader_uses_configured_stores() {
        let idfa = FakeMemcached::start().await;
        let dir = tempfile::tempdir().unwrap();
        write_gz(dir.path(), "a.tsv.gz", &lines(4, 0));
        write_gz(dir.path(), "b.tsv.gz", "idfa\tx\t1.0\t2.0\t1\nimei\ty\t1.0\t2.0\t1\n");

        let mut config = config_for(dir.path(), ".tsv.gz");
        config.stores.clear();
        config
            .stores
            .insert("idfa".to_string(), StoreConfig::new(&idfa.address));

        let summary = run_loader(&config).await.unwrap();

        assert_eq!(summary.files_committed, 1);
        assert_eq!(summary.files_retained, 1);
        assert_eq!(summary.lines_processed, 6);
        assert_eq!(summary.reports[1].stats.failures.route, 1);
        assert_eq!(idfa.len(), 5);
        assert!(dir.path().join(".a.tsv.gz").exists());
        assert!(dir.path().join("b.tsv.gz").exists());
    }
}

mod config_tests {
    use clap::Parser;
    use memloader::CliArgs;

    #[test]
    fn test_yaml_with_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memloader.yaml");
        std::fs::write(
            &path,
            r#"
source:
  pattern: "/data/appsinstalled/*.tsv.gz"
stores:
  idfa:
    address: "memc-idfa:11211"
  gaid:
    address: "memc-gaid:11211"
error_handling:
  max_error_rate: 0.02
"#,
        )
        .unwrap();

        let args = CliArgs::try_parse_from([
            "memloader",
            "--config",
            path.to_str().unwrap(),
            "--adid",
            "memc-adid:11211",
            "--dry",
        ])
        .unwrap();
        let config = args.load_config().unwrap();

        assert_eq!(config.source.pattern, "/data/appsinstalled/*.tsv.gz");
        assert_eq!(
            config.stores.keys().collect::<Vec<_>>(),
            vec!["idfa", "gaid", "adid"]
        );
        assert_eq!(config.error_handling.max_error_rate, 0.02);
        assert!(config.dry_run);
    }
}
