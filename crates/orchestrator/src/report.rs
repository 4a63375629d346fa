use escrow_audit_types::{AuditResult, AuditStatus};
use serde::{Deserialize, Serialize};

/// Everything one audit produced: the primary direction first, then the
/// reverse direction when requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub primary: Vec<AuditResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reverse: Vec<AuditResult>,
}

impl AuditReport {
    pub fn results(&self) -> impl Iterator<Item = &AuditResult> {
        self.primary.iter().chain(self.reverse.iter())
    }

    /// Worst token status across both passes; drives the process exit
    /// code.
    pub fn worst_status(&self) -> AuditStatus {
        self.results()
            .map(|r| r.status)
            .max()
            .unwrap_or(AuditStatus::Balanced)
    }

    pub fn exit_code(&self) -> i32 {
        self.worst_status().exit_code()
    }
}
