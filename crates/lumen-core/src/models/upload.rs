use crate::error::AppError;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock instant shared by a primary object and its derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UploadTimestamp(NaiveDateTime);

impl UploadTimestamp {
    const KEY_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn now() -> Self {
        Self(Utc::now().naive_utc())
    }

    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self(at)
    }

    /// Microsecond-precision rendering used inside object keys,
    /// e.g. `2022-05-20T21:22:56.184297`.
    pub fn key_component(&self) -> String {
        self.0.format(Self::KEY_FORMAT).to_string()
    }
}

/// Path of one object in the store: `{prefix}{timestamp}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stages of one upload, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    Validating,
    Uploading,
    PresigningSource,
    GeneratingDerivative,
    UploadingDerivative,
    Completed,
}

impl UploadStage {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStage::Validating => "validating",
            UploadStage::Uploading => "uploading",
            UploadStage::PresigningSource => "presigning_source",
            UploadStage::GeneratingDerivative => "generating_derivative",
            UploadStage::UploadingDerivative => "uploading_derivative",
            UploadStage::Completed => "completed",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an upload whose primary object was persisted.
///
/// Failures before the primary object is durable are reported as `AppError`
/// instead; this type only exists once there is something in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed {
        primary_key: ObjectKey,
        /// `None` for generic files, which get no derivative.
        derivative_key: Option<ObjectKey>,
    },
    /// The primary object is stored but the derivative stage failed.
    /// The primary object is not rolled back.
    PartialSuccess {
        primary_key: ObjectKey,
        failed_stage: UploadStage,
        reason: String,
    },
}

impl UploadOutcome {
    pub fn primary_key(&self) -> &ObjectKey {
        match self {
            UploadOutcome::Completed { primary_key, .. }
            | UploadOutcome::PartialSuccess { primary_key, .. } => primary_key,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, UploadOutcome::Completed { .. })
    }

    /// Collapse into the caller-facing result, turning a partial success into
    /// `AppError::PartialSuccess`.
    pub fn into_result(self) -> Result<(ObjectKey, Option<ObjectKey>), AppError> {
        match self {
            UploadOutcome::Completed {
                primary_key,
                derivative_key,
            } => Ok((primary_key, derivative_key)),
            UploadOutcome::PartialSuccess {
                primary_key,
                failed_stage,
                reason,
            } => Err(AppError::PartialSuccess {
                primary_key: primary_key.into_string(),
                stage: failed_stage.to_string(),
                reason,
            }),
        }
    }
}
