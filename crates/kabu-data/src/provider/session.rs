//! 종목 상세 페이지 소스 인터페이스.
//!
//! 수집 작업은 종목마다 `DetailSource::open`으로 전용 세션을 열고,
//! 세션에서 필드 단위로 값을 추출한 뒤 반드시 `close`합니다.
//! 세션은 작업 간에 공유되지 않습니다.

use async_trait::async_trait;
use kabu_core::{FieldSpec, FieldValue, StockCode};
use thiserror::Error;

/// 세션 생성/페이지 이동 오류. 작업 전체 실패로 처리됩니다.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("세션 생성 실패: {0}")]
    Open(String),

    #[error("페이지 이동 실패 ({code}): {reason}")]
    Navigation { code: StockCode, reason: String },
}

/// 필드 추출 오류.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// 요소 대기 시간 초과 (재시도 대상)
    #[error("요소 대기 시간 초과: {0}")]
    Timeout(FieldSpec),

    /// 요소 없음
    #[error("요소 없음: {0}")]
    Missing(FieldSpec),

    /// 값 변환 실패
    #[error("값 변환 실패 ({field}): {raw:?}")]
    Parse { field: FieldSpec, raw: String },

    /// 세션이 더 이상 사용할 수 없는 상태 (작업 중단)
    #[error("세션 오류: {0}")]
    Session(String),
}

impl ExtractError {
    /// 작업 전체를 중단해야 하는 오류인지 여부.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Session(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// 한 종목 전용 세션.
#[async_trait]
pub trait DetailSession: Send {
    /// 필드 하나를 추출합니다.
    async fn extract(&mut self, field: FieldSpec) -> Result<FieldValue, ExtractError>;

    /// 세션을 닫습니다. 모든 종료 경로에서 호출됩니다.
    async fn close(self: Box<Self>);
}

/// 종목 상세 페이지 소스.
#[async_trait]
pub trait DetailSource: Send + Sync {
    fn name(&self) -> &str;

    /// 종목 전용 세션을 엽니다.
    async fn open(&self, code: StockCode) -> Result<Box<dyn DetailSession>, SessionError>;
}
