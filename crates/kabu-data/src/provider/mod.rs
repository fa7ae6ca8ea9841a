//! 데이터 Provider 모듈.
//!
//! ## 종목 코드 Provider
//! - `JQuantsProvider`: J-Quants API (refresh token 필요), 프라임 시장 종목만
//! - `JpxListingProvider`: JPX 공개 페이지 크롤링
//! - `LocalFileProvider`: 로컬 코드 파일 (백업용)
//! - `UniverseChain`: 우선순위 순서로 시도하는 fallback 체인
//!
//! ## 상세 페이지 소스
//! - `DetailSource` / `DetailSession`: 종목별 필드 추출 인터페이스
//! - `NikkeiSource`: 닛케이 종목 페이지 크롤러

pub mod jpx;
pub mod jquants;
pub mod nikkei;
pub mod session;
pub mod universe;

use std::time::Duration;

use reqwest::Client;

use crate::error::{DataError, Result};

pub use jpx::JpxListingProvider;
pub use jquants::JQuantsProvider;
pub use nikkei::NikkeiSource;
pub use session::{DetailSession, DetailSource, ExtractError, SessionError};
pub use universe::{AcquireMethod, LocalFileProvider, UniverseChain, UniverseProvider};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 공용 HTTP 클라이언트를 생성합니다.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))
}
