//! Audit sink stand-ins.

use async_trait::async_trait;
use parking_lot::Mutex;
use policy_engine_sdk::ports::{AuditRecord, AuditSink};
use policy_engine_sdk::PolicyEngineError;

/// Sink that forwards records to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), PolicyEngineError> {
        tracing::info!(
            actor = %record.actor,
            operation = %record.operation,
            detail = %record.detail,
            "audit"
        );
        Ok(())
    }
}

/// Sink that keeps records in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), PolicyEngineError> {
        self.records.lock().push(record);
        Ok(())
    }
}
