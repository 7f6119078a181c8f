use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::pipeline::RunSummary;

/// One-line JSON status printed on stdout for the invoking CI step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage<T> {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonePayload {
    pub branch: String,
    pub report: String,
    pub versions: usize,
    pub tests: usize,
    pub regressions: usize,
}

pub fn done_message(summary: &RunSummary) -> StatusMessage<DonePayload> {
    let versions = summary.report.versions.values();
    StatusMessage {
        msg_type: "report_done".to_string(),
        payload: Some(DonePayload {
            branch: summary.report.branch.clone(),
            report: summary.report_path.display().to_string(),
            versions: summary.report.versions.len(),
            tests: versions.clone().map(|v| v.totals.total).sum(),
            regressions: versions.map(|v| v.totals.regression).sum(),
        }),
    }
}

pub fn error_message(err: &ReportError) -> StatusMessage<ErrorPayload> {
    StatusMessage {
        msg_type: "error".to_string(),
        payload: Some(ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        }),
    }
}
