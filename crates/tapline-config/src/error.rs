// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types for tapline-config.
//!
//! Covers file loading, parsing, validation, and the saved-server
//! registry. Validation errors carry the offending field path so a
//! `tapline validate` run points at the exact line to fix.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field path that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// File I/O error.
    #[error("Failed to access '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Invalid environment variable value.
    #[error("Invalid environment variable value for '{name}': {message}")]
    InvalidEnvVar {
        /// The environment variable name.
        name: String,
        /// Error message.
        message: String,
    },

    /// Value out of range.
    #[error("Value out of range for '{field}': {value} (expected {min}..{max})")]
    OutOfRange {
        /// The field path.
        field: String,
        /// The actual value.
        value: String,
        /// Minimum value.
        min: String,
        /// Maximum value.
        max: String,
    },

    /// Unsupported configuration format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The unsupported format.
        format: String,
    },

    /// Serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// A registry server with this name already exists.
    #[error("Duplicate server name: {name}")]
    DuplicateServer {
        /// The duplicated server name.
        name: String,
    },

    /// No registry server with this name exists.
    #[error("Server not found: {name}")]
    ServerNotFound {
        /// The missing server name.
        name: String,
    },

    /// The tag is already saved for this server.
    #[error("Duplicate tag '{node_id}' for server '{server}'")]
    DuplicateTag {
        /// The server name.
        server: String,
        /// The duplicated node id.
        node_id: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an out of range error.
    pub fn out_of_range<T: std::fmt::Display>(
        field: impl Into<String>,
        value: T,
        min: T,
        max: T,
    ) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a duplicate server error.
    pub fn duplicate_server(name: impl Into<String>) -> Self {
        Self::DuplicateServer { name: name.into() }
    }

    /// Creates a server not found error.
    pub fn server_not_found(name: impl Into<String>) -> Self {
        Self::ServerNotFound { name: name.into() }
    }

    /// Creates a duplicate tag error.
    pub fn duplicate_tag(server: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self::DuplicateTag {
            server: server.into(),
            node_id: node_id.into(),
        }
    }

    /// Returns a user-friendly error message in Korean.
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Parse { path, message } => {
                format!("설정 파일 파싱 실패 ({}): {}", path.display(), message)
            }
            ConfigError::Validation { field, message } => {
                format!("설정 검증 실패 ({}): {}", field, message)
            }
            ConfigError::MissingField { field } => {
                format!("필수 설정 누락: {}", field)
            }
            ConfigError::Io { path, .. } => {
                format!("파일 접근 실패: {}", path.display())
            }
            ConfigError::FileNotFound { path } => {
                format!("파일을 찾을 수 없습니다: {}", path.display())
            }
            ConfigError::InvalidEnvVar { name, message } => {
                format!("잘못된 환경 변수 값 ({}): {}", name, message)
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                format!(
                    "범위 초과 ({}): {} (허용 범위: {}..{})",
                    field, value, min, max
                )
            }
            ConfigError::UnsupportedFormat { format } => {
                format!("지원하지 않는 설정 형식: {}", format)
            }
            ConfigError::Serialization { message } => {
                format!("직렬화 오류: {}", message)
            }
            ConfigError::DuplicateServer { name } => {
                format!("중복된 서버 이름: {}", name)
            }
            ConfigError::ServerNotFound { name } => {
                format!("서버를 찾을 수 없습니다: {}", name)
            }
            ConfigError::DuplicateTag { server, node_id } => {
                format!("중복된 태그 ({}/{})", server, node_id)
            }
        }
    }

    /// Returns `true` if this error is related to file I/O.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            ConfigError::Io { .. } | ConfigError::FileNotFound { .. }
        )
    }

    /// Returns the error type as a string for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "parse",
            ConfigError::Validation { .. } => "validation",
            ConfigError::MissingField { .. } => "missing_field",
            ConfigError::Io { .. } => "io",
            ConfigError::FileNotFound { .. } => "file_not_found",
            ConfigError::InvalidEnvVar { .. } => "invalid_env_var",
            ConfigError::OutOfRange { .. } => "out_of_range",
            ConfigError::UnsupportedFormat { .. } => "unsupported_format",
            ConfigError::Serialization { .. } => "serialization",
            ConfigError::DuplicateServer { .. } => "duplicate_server",
            ConfigError::ServerNotFound { .. } => "server_not_found",
            ConfigError::DuplicateTag { .. } => "duplicate_tag",
        }
    }
}

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
