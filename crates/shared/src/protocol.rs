use serde::{Deserialize, Serialize};

use crate::domain::UserId;

pub const ANALYZE_RESUME_FUNCTION: &str = "analyzeResume";
pub const RESUME_PREFIX: &str = "resumes";

/// Object path for an uploaded résumé:
/// `resumes/<uid>/<uploaded_at_ms>-<file_name>`.
pub fn resume_object_path(uid: &UserId, uploaded_at_ms: i64, file_name: &str) -> String {
    format!("{RESUME_PREFIX}/{uid}/{uploaded_at_ms}-{file_name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResumeRequest {
    pub file_path: String,
    pub job_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResumeResponse {
    pub score: f64,
}

/// Body of a callable-function invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallableRequest<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallableErrorBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Response of a callable function: exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallableResponse<T> {
    pub result: Option<T>,
    pub error: Option<CallableErrorBody>,
}

/// Durable reference to an object written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub full_path: String,
    pub bucket: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_resume_path_scoped_by_identity_and_timestamp() {
        let path = resume_object_path(&UserId::from("u123"), 1_700_000_000_000, "resume.pdf");
        assert_eq!(path, "resumes/u123/1700000000000-resume.pdf");
    }

    #[test]
    fn analyze_request_uses_camel_case_keys() {
        let request = CallableRequest {
            data: AnalyzeResumeRequest {
                file_path: "resumes/u1/1-cv.pdf".to_string(),
                job_description: "Rust engineer".to_string(),
            },
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["data"]["filePath"], "resumes/u1/1-cv.pdf");
        assert_eq!(value["data"]["jobDescription"], "Rust engineer");
    }

    #[test]
    fn callable_response_accepts_error_without_result() {
        let parsed: CallableResponse<AnalyzeResumeResponse> = serde_json::from_str(
            r#"{"error":{"status":"INVALID_ARGUMENT","message":"not a pdf"}}"#,
        )
        .expect("parse");
        assert!(parsed.result.is_none());
        assert_eq!(parsed.error.expect("error").message, "not a pdf");
    }
}
