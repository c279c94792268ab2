use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(MessageId);
id_newtype!(RequestToken);

/// Random identifier of a tracked upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub Uuid);

impl FileId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for FileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Error,
}

/// Requested answer length/structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnswerMode {
    #[default]
    #[serde(rename = "concise")]
    Concise,
    #[serde(rename = "5-mark")]
    FiveMark,
    #[serde(rename = "10-mark")]
    TenMark,
}

impl AnswerMode {
    /// Value sent to the answering backend.
    pub fn wire_name(self) -> &'static str {
        match self {
            AnswerMode::Concise => "concise",
            AnswerMode::FiveMark => "5-mark",
            AnswerMode::TenMark => "10-mark",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnswerMode::Concise => "Short",
            AnswerMode::FiveMark => "5-mark",
            AnswerMode::TenMark => "10-mark",
        }
    }

    /// Shape the backend is asked to give the answer.
    pub fn instruction(self) -> &'static str {
        match self {
            AnswerMode::Concise => "Answer concisely.",
            AnswerMode::FiveMark => {
                "Provide a structured answer suitable for a 5-mark exam question (approx 150-200 words). Include point-wise explanation if applicable."
            }
            AnswerMode::TenMark => {
                "Provide a detailed, comprehensive answer suitable for a 10-mark exam question (approx 400-500 words). Include Introduction, Key Concepts, Detailed Analysis, and Conclusion."
            }
        }
    }
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown answer mode '{0}' (expected concise, five-mark or ten-mark)")]
pub struct UnknownAnswerMode(pub String);

impl FromStr for AnswerMode {
    type Err = UnknownAnswerMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concise" | "short" => Ok(AnswerMode::Concise),
            "five-mark" | "5-mark" | "five_mark" | "5" => Ok(AnswerMode::FiveMark),
            "ten-mark" | "10-mark" | "ten_mark" | "10" => Ok(AnswerMode::TenMark),
            _ => Err(UnknownAnswerMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    #[serde(default)]
    pub kind: MessageKind,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileStatus {
    Uploading,
    Complete,
    Error { reason: String },
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FileStatus::Uploading)
    }
}

/// A candidate offered for admission; nothing about it is trusted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCandidate {
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, size_bytes: u64, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            media_type: media_type.into(),
        }
    }
}

/// What a processor is told about an admitted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: FileId,
    pub name: String,
    pub size_bytes: u64,
    pub size_display: String,
    pub media_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: FileId,
    pub name: String,
    pub size_display: String,
    pub status: FileStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_mode_uses_backend_wire_names() {
        assert_eq!(
            serde_json::to_string(&AnswerMode::FiveMark).expect("serialize"),
            "\"5-mark\""
        );
        let parsed: AnswerMode = serde_json::from_str("\"10-mark\"").expect("deserialize");
        assert_eq!(parsed, AnswerMode::TenMark);
    }

    #[test]
    fn answer_mode_parses_cli_spellings() {
        assert_eq!("five-mark".parse::<AnswerMode>(), Ok(AnswerMode::FiveMark));
        assert_eq!(" Ten-Mark ".parse::<AnswerMode>(), Ok(AnswerMode::TenMark));
        assert_eq!("short".parse::<AnswerMode>(), Ok(AnswerMode::Concise));
        assert!("essay".parse::<AnswerMode>().is_err());
    }

    #[test]
    fn file_id_round_trips_through_display() {
        let id = FileId::random();
        let parsed: FileId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn file_status_terminality() {
        assert!(!FileStatus::Uploading.is_terminal());
        assert!(FileStatus::Complete.is_terminal());
        assert!(FileStatus::Error {
            reason: "boom".into()
        }
        .is_terminal());
    }
}
