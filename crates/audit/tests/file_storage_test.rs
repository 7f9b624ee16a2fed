//! JSON-lines sink behaviour
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vaultline_audit::{
    AuditBuffer, AuditConfig, AuditFilter, AuditStorage, DataAccessPayload, DataAction,
    EntryType, FileAuditStorage, RequestContext, RequestPayload, SecurityEventPayload, Severity,
};
use vaultline_core::{Error, Result};

#[tokio::test]
async fn test_records_survive_reopen_and_filter() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("audit.jsonl");

    {
        let storage = Arc::new(FileAuditStorage::open(&path).await?);
        let buffer = AuditBuffer::new(
            AuditConfig::default().with_flush_interval(Duration::from_secs(3600)),
            storage,
        )?;

        let audit_id = buffer.start_audit(RequestContext::new("tenant-1", "alice"));
        buffer
            .log_request(&audit_id, RequestPayload::new("GET", "/v1/customers/7"))
            .await?;
        buffer
            .log_data_access(
                &audit_id,
                DataAccessPayload::new("customer", "7", DataAction::Read).with_fields(["email"]),
            )
            .await?;
        buffer
            .log_security_event(
                "other",
                SecurityEventPayload::new("login_failed", Severity::High, "bad password"),
            )
            .await?;
        buffer.stop().await?;
    }

    let storage = FileAuditStorage::open(&path).await?;
    let all = storage.query(&AuditFilter::new()).await?;
    assert_eq!(all.len(), 3);

    let alice = storage.query(&AuditFilter::new().user("alice")).await?;
    assert_eq!(alice.len(), 2);

    let access = storage
        .query(&AuditFilter::new().entry_type(EntryType::DataAccess))
        .await?;
    assert_eq!(access.len(), 1);
    assert_eq!(access[0].tenant_id, "tenant-1");

    let first = storage.query(&AuditFilter::new().limit(1)).await?;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].entry_type(), EntryType::Request);
    Ok(())
}

#[tokio::test]
async fn test_edited_line_fails_integrity_verification() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("audit.jsonl");
    let storage = Arc::new(FileAuditStorage::open(&path).await?);
    let buffer = AuditBuffer::new(
        AuditConfig::default().with_flush_interval(Duration::from_secs(3600)),
        storage,
    )?;

    let audit_id = buffer.start_audit(RequestContext::new("tenant-1", "mallory"));
    buffer
        .log_request(&audit_id, RequestPayload::new("DELETE", "/v1/ledger/42"))
        .await?;
    buffer
        .log_request(&audit_id, RequestPayload::new("GET", "/v1/ledger"))
        .await?;
    buffer.flush().await?;
    assert!(buffer.verify_integrity(&audit_id).await?.verified);

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    let tampered = content.replacen("DELETE", "GET", 1);
    tokio::fs::write(&path, tampered).await.unwrap();

    let report = buffer.verify_integrity(&audit_id).await?;
    assert!(!report.verified);
    assert_eq!(report.total_records, 2);
    assert_eq!(report.corrupted_records.len(), 1);
    buffer.stop().await
}

#[tokio::test]
async fn test_unparseable_line_is_an_error_not_a_miss() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("audit.jsonl");
    let storage = FileAuditStorage::open(&path).await?;
    tokio::fs::write(&path, "{not json}\n").await.unwrap();

    let err = storage.query(&AuditFilter::new()).await.unwrap_err();
    assert!(err.to_string().contains("corrupt audit record"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tight_flush_timeout_never_duplicates_lines() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("audit.jsonl");
    let storage = Arc::new(FileAuditStorage::open(&path).await?);
    let config = AuditConfig::default()
        .with_buffer_size(20)
        .with_max_buffered_records(10_000)
        .with_flush_interval(Duration::from_millis(5))
        .with_flush_timeout(Duration::from_micros(50));
    let buffer = Arc::new(AuditBuffer::new(config, storage.clone())?);

    let mut handles = Vec::new();
    for worker in 0..4 {
        let buffer = Arc::clone(&buffer);
        handles.push(tokio::spawn(async move {
            let audit_id = format!("audit-{worker}");
            for n in 0..50 {
                // A timed-out flush still keeps the record buffered.
                match buffer
                    .log_request(&audit_id, RequestPayload::new("GET", format!("/v1/{n}")))
                    .await
                {
                    Ok(()) | Err(Error::Timeout { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }));
    }
    for handle in handles {
        handle.await.unwrap()?;
    }

    for _ in 0..500 {
        if buffer.metrics().buffered == 0 {
            break;
        }
        let _ = buffer.flush().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(buffer.metrics().buffered, 0);
    buffer.stop().await?;

    let stored = storage.query(&AuditFilter::new()).await?;
    let mut ids: Vec<&str> = stored.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(stored.len(), 200);
    assert_eq!(ids.len(), 200);
    Ok(())
}
