//! 수집 파이프라인 공통 도메인 모델.
//!
//! 이 crate는 다음을 제공합니다:
//! - 4자리 증권 코드(`StockCode`)와 정규화 규칙
//! - 종목별 수집 결과(`FetchResult`)와 필드 명세
//! - tracing 기반 로깅 초기화

pub mod domain;
pub mod error;
pub mod logging;

pub use domain::*;
pub use error::{CoreError, Result};
