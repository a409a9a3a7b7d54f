// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::transport::{FakeTransport, MemoryTransport, OpKind};
use std::sync::{Arc, Mutex};
use tabletx_core::Fields;
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::default();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn row(key: &str) -> Row {
    Row::new(EntityKeys::new("p", key), Fields::new())
}

#[test]
fn traced_insert_logs_span_and_outcome() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedTransport::new(MemoryTransport::new().with_table("Users"));
        traced.insert("Users", row("alice")).await
    });

    assert!(result.is_ok(), "insert should succeed: {result:?}");
    assert!(logs.contains("store.insert"), "Logs:\n{logs}");
    assert!(logs.contains("p/alice"), "Logs:\n{logs}");
    assert!(logs.contains("elapsed_ms"), "Logs:\n{logs}");
}

#[test]
fn traced_conflict_is_not_an_error_line() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedTransport::new(MemoryTransport::new().with_table("Users"));
        traced.insert("Users", row("alice")).await.unwrap();
        traced
            .replace("Users", row("alice"), &VersionToken::new("stale"))
            .await
    });

    assert!(matches!(result, Err(TransportError::VersionConflict(_))));
    assert!(logs.contains("rejected"), "Logs:\n{logs}");
    assert!(!logs.contains("ERROR"), "Logs:\n{logs}");
}

#[test]
fn traced_fatal_fault_logs_error() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeTransport::over(MemoryTransport::new().with_table("Users"));
        fake.fail_next(OpKind::Get, TransportError::Fatal("socket closed".into()));
        let traced = TracedTransport::new(fake);
        traced.get("Users", &EntityKeys::new("p", "alice")).await
    });

    assert!(result.is_err());
    assert!(logs.contains("ERROR"), "Logs:\n{logs}");
    assert!(logs.contains("socket closed"), "Logs:\n{logs}");
}

#[test]
fn traced_batch_logs_partition_and_size() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedTransport::new(MemoryTransport::new().with_table("Users"));
        let ops = vec![
            BatchOp::InsertOrReplace(row("a")),
            BatchOp::InsertOrReplace(row("b")),
        ];
        traced.execute_batch("Users", ops).await
    });

    assert_eq!(result.unwrap().len(), 2);
    assert!(logs.contains("store.batch"), "Logs:\n{logs}");
    assert!(logs.contains("size=2"), "Logs:\n{logs}");
}

#[tokio::test]
async fn traced_passes_results_through() {
    let traced = TracedTransport::new(MemoryTransport::new());
    let err = traced
        .scan("Missing", &ScanQuery::table(10), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FaultKind::TableMissing);
    assert!(!traced.inner().table_exists("Missing"));
}
