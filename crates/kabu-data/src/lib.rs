//! 데이터 수집 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 상장 종목 코드 Provider 체인 (J-Quants, JPX, 로컬 파일)
//! - 종목 상세 페이지 소스 (닛케이)
//! - 출력 테이블 로드/저장과 upsert 병합
//! - 일자별 시계열 저장소와 메타데이터 원장
//! - 업종별 파생 뷰 캐시 (24시간 TTL)

pub mod cache;
pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use cache::{
    build_sector_view, load_classification, Classification, DerivedViewCache, SectorView, ViewRow,
};
pub use provider::{
    build_http_client, AcquireMethod, DetailSession, DetailSource, ExtractError,
    JQuantsProvider, JpxListingProvider, LocalFileProvider, NikkeiSource, SessionError,
    UniverseChain, UniverseProvider,
};
pub use storage::{
    merge_results, save_codes, CleanupReport, LedgerEntry, MergeOutcome, MergeStats,
    MetadataLedger, OutputTable, QueryFrame, QueryRow, StoreStatistics, TimeSeriesStore,
};
