//! 핵심 오류 타입.

use thiserror::Error;

/// 도메인 모델 오류.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// 4자리 숫자 코드로 정규화할 수 없는 입력
    #[error("Invalid stock code: {0:?}")]
    InvalidCode(String),

    /// 알 수 없는 상태 문자열
    #[error("Unknown fetch status: {0}")]
    UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
