//! 환경변수 기반 설정 모듈.

use std::path::PathBuf;
use std::time::Duration;

use kabu_data::provider::{jpx, jquants, nikkei};
use secrecy::SecretString;

use crate::Result;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 파일 경로 설정
    pub paths: PathsConfig,
    /// 상세 페이지 수집 설정
    pub fetch: FetchConfig,
    /// 외부 데이터 소스 설정
    pub sources: SourcesConfig,
    /// 시계열 보관 설정
    pub retention: RetentionConfig,
    /// 파생 뷰 캐시 설정
    pub view: ViewConfig,
}

/// 파일 경로 설정
#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// 종목 코드 파일 (한 줄에 하나, 헤더 없음)
    pub codes_file: PathBuf,
    /// 출력 테이블 CSV
    pub output_file: PathBuf,
    /// 코드 파일 백업 디렉터리
    pub backup_dir: PathBuf,
    /// 일자별 시계열 디렉터리
    pub history_dir: PathBuf,
    /// 업종별 뷰 캐시 파일
    pub view_cache_file: PathBuf,
    /// 업종 분류표 CSV
    pub classification_file: PathBuf,
}

/// 상세 페이지 수집 설정
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// 동시 작업 수
    pub concurrency: usize,
    /// 요소 대기 시간 초과 시 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간 딜레이 (밀리초)
    pub retry_delay_ms: u64,
    /// 요소 대기 시간 (초)
    pub element_timeout_secs: u64,
    /// 종목 하나의 전체 작업 시간 (초)
    pub task_timeout_secs: u64,
    /// 배치 전체 마감 시간 (초). 지나면 새 작업을 시작하지 않음
    pub batch_deadline_secs: Option<u64>,
    /// HTTP 요청 시간 (초)
    pub request_timeout_secs: u64,
}

/// 외부 데이터 소스 설정
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    /// J-Quants 리프레시 토큰 (Debug 출력 시 가려짐)
    pub jquants_refresh_token: Option<SecretString>,
    pub jquants_base_url: String,
    pub jpx_listing_url: String,
    pub nikkei_base_url: String,
}

/// 시계열 보관 설정
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// 보관 일수
    pub keep_days: u32,
}

/// 파생 뷰 캐시 설정
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// 캐시 유효 시간 (시간 단위)
    pub cache_ttl_hours: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            paths: PathsConfig {
                codes_file: env_var_path("CODES_FILE", "data/codes.csv"),
                output_file: env_var_path("OUTPUT_FILE", "data/output.csv"),
                backup_dir: env_var_path("BACKUP_DIR", "data/backup"),
                history_dir: env_var_path("HISTORY_DIR", "data/history"),
                view_cache_file: env_var_path("VIEW_CACHE_FILE", "data/sector_view.json"),
                classification_file: env_var_path("CLASSIFICATION_FILE", "data/classification.csv"),
            },
            fetch: FetchConfig {
                concurrency: env_var_parse("FETCH_CONCURRENCY", 4),
                max_retries: env_var_parse("FETCH_MAX_RETRIES", 1),
                retry_delay_ms: env_var_parse("FETCH_RETRY_DELAY_MS", 1000),
                element_timeout_secs: env_var_parse("FETCH_ELEMENT_TIMEOUT_SECS", 15),
                task_timeout_secs: env_var_parse("FETCH_TASK_TIMEOUT_SECS", 120),
                batch_deadline_secs: std::env::var("FETCH_BATCH_DEADLINE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
                request_timeout_secs: env_var_parse("FETCH_REQUEST_TIMEOUT_SECS", 30),
            },
            sources: SourcesConfig {
                jquants_refresh_token: std::env::var("JQUANTS_REFRESH_TOKEN")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(SecretString::from),
                jquants_base_url: env_var_string("JQUANTS_BASE_URL", jquants::DEFAULT_BASE_URL),
                jpx_listing_url: env_var_string("JPX_LISTING_URL", jpx::DEFAULT_LISTING_URL),
                nikkei_base_url: env_var_string("NIKKEI_BASE_URL", nikkei::DEFAULT_BASE_URL),
            },
            retention: RetentionConfig {
                keep_days: env_var_parse("HISTORY_KEEP_DAYS", 365),
            },
            view: ViewConfig {
                cache_ttl_hours: env_var_parse("VIEW_CACHE_TTL_HOURS", 24),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fetch.concurrency == 0 {
            return Err(crate::error::CollectorError::Config(
                "FETCH_CONCURRENCY는 1 이상이어야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

impl FetchConfig {
    /// 재시도 간 딜레이를 Duration으로 반환
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ViewConfig {
    /// 캐시 유효 시간을 Duration으로 반환
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(60 * 60))
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_var_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(env_var_string(key, default))
}
