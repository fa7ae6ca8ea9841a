//! TSE Prime 종목 펀더멘털 수집기.
//!
//! 이 crate는 다음 작업을 수행하는 바이너리와 라이브러리를 제공합니다:
//! - 종목 코드 취득 (J-Quants → JPX → 로컬 파일 fallback) 및 정규화
//! - 재개/구간 선택 후 상세 페이지 병렬 수집
//! - 기존 출력 테이블과 upsert 병합, 일자별 시계열 저장
//! - 시계열 조회/정리와 업종별 파생 뷰

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
