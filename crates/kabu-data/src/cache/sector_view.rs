//! 업종별 파생 뷰와 파일 캐시.
//!
//! 출력 테이블을 업종 분류표와 조인하고, 필수 지표가 빠진 행을 제외한 뒤
//! `pbr_indicator = expected_roe * expected_per / 100`을 계산하여 업종별로 묶습니다.
//! 조인/그룹 연산을 매번 반복하지 않도록 결과를 JSON 파일로 보관하며,
//! 파일 수정 시각이 TTL(기본 24시간) 이내일 때만 재사용합니다.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use kabu_core::StockCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::storage::{write_atomic, OutputTable};

/// 기본 캐시 유효 시간.
pub const DEFAULT_VIEW_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// 캐시 파일 수정 시각이 유효 기간 안인지 여부.
///
/// 수정 시각이 현재보다 미래이면 (시계 차이) 유효한 것으로 봅니다.
pub fn is_fresh(modified: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age < ttl,
        Err(_) => true,
    }
}

/// 파생 뷰 파일 캐시.
pub struct DerivedViewCache {
    path: PathBuf,
    ttl: Duration,
}

impl DerivedViewCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 캐시 파일이 있고 유효한지 여부.
    pub fn is_valid(&self) -> bool {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map(|modified| is_fresh(modified, SystemTime::now(), self.ttl))
            .unwrap_or(false)
    }

    /// 유효한 캐시가 있으면 읽고, 없으면 `build`로 만들어 저장합니다.
    ///
    /// 캐시 파일이 손상되었으면 다시 만듭니다. 저장 실패는 경고만 남깁니다.
    pub fn get_or_build<T, F>(&self, build: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if self.is_valid() {
            match self.read::<T>() {
                Ok(value) => {
                    tracing::debug!(path = %self.path.display(), "파생 뷰 캐시 적중");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "캐시 파일 손상, 재생성");
                }
            }
        }

        let value = build()?;
        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(e) = write_atomic(&self.path, &bytes) {
                    tracing::warn!(path = %self.path.display(), error = %e, "캐시 저장 실패");
                } else {
                    tracing::info!(path = %self.path.display(), "파생 뷰 캐시 갱신");
                }
            }
            Err(e) => tracing::warn!(error = %e, "캐시 직렬화 실패"),
        }

        Ok(value)
    }

    /// 캐시 파일을 삭제합니다.
    pub fn invalidate(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// 종목 코드 → 업종 (33業種区分) 분류표.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    sectors: HashMap<StockCode, String>,
}

impl Classification {
    pub fn sector(&self, code: &StockCode) -> Option<&str> {
        self.sectors.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

impl FromIterator<(StockCode, String)> for Classification {
    fn from_iter<I: IntoIterator<Item = (StockCode, String)>>(iter: I) -> Self {
        Self {
            sectors: iter.into_iter().collect(),
        }
    }
}

#[derive(Deserialize)]
struct ClassificationRecord {
    #[serde(alias = "コード")]
    code: String,
    #[serde(alias = "33業種区分")]
    sector: String,
}

/// 분류표 CSV를 읽습니다. 헤더는 `code`/`コード`, `sector`/`33業種区分`.
///
/// 코드가 잘못되었거나 업종이 비어 있는 (`-`) 행은 제외합니다.
pub fn load_classification(path: &Path) -> Result<Classification> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| DataError::NotFound(format!("{}: {}", path.display(), e)))?;

    let mut classification = Classification::default();
    for record in reader.deserialize::<ClassificationRecord>() {
        let record = record?;
        let sector = record.sector.trim();
        if sector.is_empty() || sector == "-" {
            continue;
        }

        if let Some(code) = StockCode::normalize(&record.code) {
            classification.sectors.insert(code, sector.to_string());
        }
    }

    tracing::debug!(count = classification.len(), "업종 분류표 로드");
    Ok(classification)
}

/// 뷰의 한 행.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    pub code: StockCode,
    pub name: String,
    pub price: Decimal,
    pub expected_per: Decimal,
    pub expected_dividend_yield: Decimal,
    pub expected_roe: Decimal,
    pub actual_pbr: Option<Decimal>,
    /// expected_roe × expected_per / 100
    pub pbr_indicator: Decimal,
}

/// 업종별 파생 뷰.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorView {
    pub built_at: DateTime<Utc>,
    pub sectors: BTreeMap<String, Vec<ViewRow>>,
}

impl SectorView {
    pub fn total_rows(&self) -> usize {
        self.sectors.values().map(Vec::len).sum()
    }

    /// 업종별 행 수.
    pub fn bucket_sizes(&self) -> Vec<(&str, usize)> {
        self.sectors
            .iter()
            .map(|(sector, rows)| (sector.as_str(), rows.len()))
            .collect()
    }
}

/// 출력 테이블로 업종별 뷰를 만듭니다.
pub fn build_sector_view(table: &OutputTable, classification: &Classification) -> SectorView {
    let hundred = Decimal::from(100);
    let mut sectors: BTreeMap<String, Vec<ViewRow>> = BTreeMap::new();
    let mut dropped = 0usize;

    for result in table.rows() {
        let Some(sector) = classification.sector(&result.code) else {
            dropped += 1;
            continue;
        };

        let (Some(roe), Some(per), Some(price), Some(dividend_yield)) = (
            result.expected_roe,
            result.expected_per,
            result.price,
            result.expected_dividend_yield,
        ) else {
            dropped += 1;
            continue;
        };

        let Some(pbr_indicator) = roe.checked_mul(per).and_then(|v| v.checked_div(hundred)) else {
            tracing::warn!(code = %result.code, roe = %roe, per = %per, "PBR 지표 계산 범위 초과, 제외");
            dropped += 1;
            continue;
        };

        sectors.entry(sector.to_string()).or_default().push(ViewRow {
            code: result.code,
            name: result.name.clone(),
            price,
            expected_per: per,
            expected_dividend_yield: dividend_yield,
            expected_roe: roe,
            actual_pbr: result.actual_pbr,
            pbr_indicator,
        });
    }

    tracing::debug!(
        sectors = sectors.len(),
        rows = table.len() - dropped,
        dropped,
        "업종별 뷰 생성"
    );

    SectorView {
        built_at: Utc::now(),
        sectors,
    }
}
