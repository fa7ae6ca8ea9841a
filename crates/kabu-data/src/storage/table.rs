//! 출력 테이블 (종목 코드 키의 CSV).
//!
//! 한 종목은 한 행입니다. 새 수집 결과는 코드 기준 upsert로 병합되며
//! 출력은 항상 코드 순으로 정렬됩니다.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use kabu_core::{FetchResult, FetchStatus, StockCode, REQUIRED_COLUMNS, TABLE_COLUMNS};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::write_atomic;
use crate::error::{DataError, Result};

/// CSV 한 행.
#[derive(Debug, Serialize, Deserialize)]
struct TableRow {
    code: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    price: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    expected_per: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    expected_dividend_yield: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    expected_roe: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    actual_pbr: Option<Decimal>,
    #[serde(default)]
    last_news_text: Option<String>,
    #[serde(default)]
    last_news_url: Option<String>,
    #[serde(default)]
    last_disclosure_text: Option<String>,
    #[serde(default)]
    last_disclosure_url: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// 빈 문자열이나 숫자가 아닌 값(`--` 등)은 `None`. 천 단위 구분자는 무시합니다.
fn de_opt_decimal<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(|text| text.trim().replace(',', ""))
        .filter(|text| !text.is_empty())
        .and_then(|text| text.parse::<Decimal>().ok()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<&FetchResult> for TableRow {
    fn from(result: &FetchResult) -> Self {
        Self {
            code: result.code.to_string(),
            name: Some(result.name.clone()),
            price: result.price,
            expected_per: result.expected_per,
            expected_dividend_yield: result.expected_dividend_yield,
            expected_roe: result.expected_roe,
            actual_pbr: result.actual_pbr,
            last_news_text: result.last_news_text.clone(),
            last_news_url: result.last_news_url.clone(),
            last_disclosure_text: result.last_disclosure_text.clone(),
            last_disclosure_url: result.last_disclosure_url.clone(),
            status: Some(result.status.to_string()),
        }
    }
}

impl TableRow {
    fn into_result(self) -> Option<FetchResult> {
        let Some(code) = StockCode::normalize(&self.code) else {
            tracing::warn!(code = %self.code, "유효하지 않은 코드 행 제외");
            return None;
        };

        let mut result = FetchResult {
            code,
            name: non_empty(self.name).unwrap_or_else(|| FetchResult::placeholder_name(&code)),
            price: self.price,
            expected_per: self.expected_per,
            expected_dividend_yield: self.expected_dividend_yield,
            expected_roe: self.expected_roe,
            actual_pbr: self.actual_pbr,
            last_news_text: non_empty(self.last_news_text),
            last_news_url: non_empty(self.last_news_url),
            last_disclosure_text: non_empty(self.last_disclosure_text),
            last_disclosure_url: non_empty(self.last_disclosure_url),
            status: FetchStatus::Partial,
        };

        result.status = match self.status.as_deref().map(str::parse::<FetchStatus>) {
            Some(Ok(status)) => status,
            _ => result.infer_status(),
        };
        Some(result)
    }
}

/// 병합 통계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// 기존 행을 덮어쓴 건수
    pub updated: usize,
    /// 새로 추가된 건수
    pub inserted: usize,
    /// 변경 없이 유지된 기존 행 수
    pub retained: usize,
}

/// 코드 키 출력 테이블.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    columns: Vec<String>,
    rows: BTreeMap<StockCode, FetchResult>,
}

impl Default for OutputTable {
    fn default() -> Self {
        Self {
            columns: TABLE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: BTreeMap::new(),
        }
    }
}

impl OutputTable {
    /// 결과 목록으로 테이블을 생성합니다. 같은 코드는 뒤의 결과가 남습니다.
    pub fn from_results(results: impl IntoIterator<Item = FetchResult>) -> Self {
        let mut table = Self::default();
        for result in results {
            table.rows.insert(result.code, result);
        }
        table
    }

    /// CSV를 읽습니다. 헤더는 그대로 보존되며 검증은 `validate`에서 합니다.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        csv_reader.set_headers(csv::StringRecord::from(columns.clone()));

        let mut rows = BTreeMap::new();
        for (line, record) in csv_reader.deserialize::<TableRow>().enumerate() {
            match record {
                Ok(row) => {
                    if let Some(result) = row.into_result() {
                        rows.insert(result.code, result);
                    }
                }
                Err(e) => tracing::warn!(line = line + 2, error = %e, "읽을 수 없는 행 제외"),
            }
        }

        Ok(Self { columns, rows })
    }

    /// 파일에서 읽습니다. 파일이 없으면 `None`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match std::fs::File::open(path) {
            Ok(file) => Self::read_csv(file).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 표준 컬럼 순서로 CSV를 씁니다.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        csv_writer.write_record(TABLE_COLUMNS)?;
        for result in self.rows.values() {
            csv_writer.serialize(TableRow::from(result))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// 파일로 저장합니다 (임시 파일에 쓴 뒤 교체).
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        write_atomic(path, &buffer)?;

        tracing::info!(path = %path.display(), rows = self.rows.len(), "출력 테이블 저장");
        Ok(())
    }

    /// 필수 컬럼 검증.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|required| !self.columns.iter().any(|c| c == *required))
            .map(|c| c.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DataError::SchemaError { missing })
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, code: &StockCode) -> bool {
        self.rows.contains_key(code)
    }

    pub fn get(&self, code: &StockCode) -> Option<&FetchResult> {
        self.rows.get(code)
    }

    /// 코드 순 행 반복자.
    pub fn rows(&self) -> impl Iterator<Item = &FetchResult> {
        self.rows.values()
    }

    /// 코드 목록 (정렬됨).
    pub fn codes(&self) -> Vec<StockCode> {
        self.rows.keys().copied().collect()
    }

    /// 코드 기준 upsert. 덮어쓰면 `true`.
    fn upsert(&mut self, result: FetchResult) -> bool {
        self.rows.insert(result.code, result).is_some()
    }
}

/// 병합 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// 기존 테이블과 병합됨
    Merged { table: OutputTable, stats: MergeStats },
    /// 검증 실패로 새 결과만 사용
    Fallback { table: OutputTable, reason: String },
}

impl MergeOutcome {
    pub fn table(&self) -> &OutputTable {
        match self {
            Self::Merged { table, .. } | Self::Fallback { table, .. } => table,
        }
    }

    pub fn into_table(self) -> OutputTable {
        match self {
            Self::Merged { table, .. } | Self::Fallback { table, .. } => table,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// 기존 테이블에 새 결과를 병합합니다.
///
/// 같은 코드는 새 결과가 통째로 덮어씁니다 (null 포함). 기존에만 있는 코드는 유지됩니다.
/// 기존 테이블이 필수 컬럼 검증에 실패하거나 병합 결과의 행 수가 맞지 않으면
/// 새 결과만으로 된 테이블을 반환합니다.
pub fn merge_results(existing: Option<OutputTable>, new_results: Vec<FetchResult>) -> MergeOutcome {
    let Some(mut table) = existing else {
        let stats = MergeStats {
            inserted: new_results.len(),
            ..Default::default()
        };
        return MergeOutcome::Merged {
            table: OutputTable::from_results(new_results),
            stats,
        };
    };

    let fallback = |reason: String, new_results: Vec<FetchResult>| {
        tracing::warn!(reason = %reason, "병합 중단, 새 결과만 저장");
        MergeOutcome::Fallback {
            table: OutputTable::from_results(new_results),
            reason,
        }
    };

    if let Err(e) = table.validate() {
        return fallback(format!("기존 테이블 검증 실패: {}", e), new_results);
    }

    let existing_len = table.len();
    let mut stats = MergeStats::default();
    for result in new_results.iter().cloned() {
        if table.upsert(result) {
            stats.updated += 1;
        } else {
            stats.inserted += 1;
        }
    }
    stats.retained = existing_len.saturating_sub(stats.updated);
    table.columns = OutputTable::default().columns;

    if let Err(reason) = verify_merged(&table, existing_len, &stats, &new_results) {
        return fallback(format!("병합 결과 검증 실패: {}", reason), new_results);
    }

    tracing::info!(
        updated = stats.updated,
        inserted = stats.inserted,
        retained = stats.retained,
        total = table.len(),
        "출력 테이블 병합"
    );
    MergeOutcome::Merged { table, stats }
}

/// 병합 결과의 행 수와 새 코드 포함 여부를 확인합니다.
fn verify_merged(
    table: &OutputTable,
    existing_len: usize,
    stats: &MergeStats,
    new_results: &[FetchResult],
) -> std::result::Result<(), String> {
    let expected = existing_len + stats.inserted;
    if table.len() != expected {
        return Err(format!("행 수 불일치 (기대 {}, 실제 {})", expected, table.len()));
    }
    if let Some(missing) = new_results.iter().find(|r| !table.contains(&r.code)) {
        return Err(format!("새 결과 누락: {}", missing.code));
    }
    Ok(())
}
