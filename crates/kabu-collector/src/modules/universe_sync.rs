//! 종목 코드 취득 및 정규화.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use kabu_core::{normalize_codes, NormalizeReport};
use kabu_data::{
    save_codes, AcquireMethod, JQuantsProvider, JpxListingProvider, LocalFileProvider,
    UniverseChain,
};
use reqwest::Client;
use tracing::info;

use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::Result;

/// 설정에 따라 기본 Provider 체인을 구성합니다.
///
/// 우선순위: J-Quants → JPX 공개 페이지 → 로컬 코드 파일.
pub fn build_universe_chain(config: &CollectorConfig, client: &Client) -> UniverseChain {
    UniverseChain::new()
        .with_provider(JQuantsProvider::new(
            client.clone(),
            config.sources.jquants_base_url.clone(),
            config.sources.jquants_refresh_token.clone(),
        ))
        .with_provider(JpxListingProvider::new(
            client.clone(),
            config.sources.jpx_listing_url.clone(),
        ))
        .with_provider(LocalFileProvider::new(config.paths.codes_file.clone()))
}

/// 원시 코드를 취득하여 정규화합니다. 취득 실패는 빈 결과입니다.
pub async fn acquire_codes(chain: &UniverseChain, method: &AcquireMethod) -> NormalizeReport {
    let raw = chain.acquire(method).await;
    let report = normalize_codes(&raw);

    info!(
        method = %method,
        raw = raw.len(),
        accepted = report.codes.len(),
        rejected = report.rejected_count(),
        duplicates = report.duplicates,
        "종목 코드 정규화 완료"
    );
    report
}

/// 코드 파일 갱신 결과.
#[derive(Debug, Clone)]
pub struct CodesSyncReport {
    pub normalized: NormalizeReport,
    pub codes_file: PathBuf,
    pub backup_file: PathBuf,
}

/// 종목 코드를 취득하여 코드 파일과 타임스탬프 백업을 저장합니다.
///
/// 유효한 코드가 하나도 없으면 기존 코드 파일을 덮어쓰지 않고 실패합니다.
pub async fn sync_codes(
    chain: &UniverseChain,
    method: &AcquireMethod,
    config: &CollectorConfig,
    now: DateTime<Local>,
) -> Result<CodesSyncReport> {
    let normalized = acquire_codes(chain, method).await;
    if normalized.codes.is_empty() {
        return Err(CollectorError::NoIdentifiers);
    }

    let backup_file = save_codes(
        &normalized.codes,
        &config.paths.codes_file,
        &config.paths.backup_dir,
        now,
    )?;

    Ok(CodesSyncReport {
        normalized,
        codes_file: config.paths.codes_file.clone(),
        backup_file,
    })
}
