//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 외부 소스 요청 실패
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 인증 실패 (토큰 없음, 만료, 거부)
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// 응답 파싱 실패
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 파일 입출력 오류
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV 읽기/쓰기 오류
    #[error("CSV error: {0}")]
    CsvError(String),

    /// JSON 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 필수 컬럼 누락
    #[error("Schema error: missing columns {missing:?}")]
    SchemaError { missing: Vec<String> },

    /// 레코드 또는 파일을 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::FetchError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::CsvError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
