//! 일자별 시계열 저장소.
//!
//! 레이아웃: `{dir}/daily_{YYYY-MM-DD}.csv` + `{dir}/metadata.json`
//!
//! - 같은 날짜로 다시 쓰면 스냅샷과 원장 항목을 교체합니다.
//! - 원장의 집계값(`total_files`, `data_points`)은 매번 항목 전체로 다시 계산합니다.
//! - 범위 조회 중 읽을 수 없는 일자 파일은 경고 후 건너뜁니다.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::table::OutputTable;
use super::write_atomic;
use crate::error::{DataError, Result};

const LEDGER_FILE: &str = "metadata.json";
const DATE_COLUMN: &str = "date";

/// 원장 항목 (일자 파티션 하나).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub filename: String,
    pub rows: usize,
    pub columns: usize,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

/// 메타데이터 원장.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataLedger {
    pub last_update: Option<DateTime<Utc>>,
    pub total_files: usize,
    pub data_points: usize,
    /// 날짜 오름차순, 날짜당 하나
    pub file_list: Vec<LedgerEntry>,
}

impl MetadataLedger {
    /// 항목 정렬 후 집계값을 다시 계산합니다.
    fn recompute(&mut self) {
        self.file_list.sort_by_key(|entry| entry.date);
        self.file_list.dedup_by_key(|entry| entry.date);
        self.total_files = self.file_list.len();
        self.data_points = self.file_list.iter().map(|entry| entry.rows).sum();
        self.last_update = Some(Utc::now());
    }

    fn upsert(&mut self, entry: LedgerEntry) {
        self.file_list.retain(|existing| existing.date != entry.date);
        self.file_list.push(entry);
        self.recompute();
    }

    pub fn entry(&self, date: NaiveDate) -> Option<&LedgerEntry> {
        self.file_list.iter().find(|entry| entry.date == date)
    }

    /// 집계값이 항목과 일치하는지 여부.
    pub fn is_consistent(&self) -> bool {
        self.total_files == self.file_list.len()
            && self.data_points == self.file_list.iter().map(|e| e.rows).sum::<usize>()
    }
}

/// 조회 결과 한 행.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub date: NaiveDate,
    /// `QueryFrame::columns` 순서의 값
    pub values: Vec<String>,
}

/// 기간 조회 결과. 첫 컬럼은 항상 `date`입니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFrame {
    /// `date`를 제외한 컬럼
    pub columns: Vec<String>,
    pub rows: Vec<QueryRow>,
}

impl QueryFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 컬럼 이름으로 값을 조회합니다.
    pub fn value<'a>(&'a self, row: &'a QueryRow, column: &str) -> Option<&'a str> {
        let index = self.columns.iter().position(|c| c == column)?;
        row.values.get(index).map(String::as_str)
    }

    /// `date` 컬럼을 앞에 붙여 CSV로 씁니다.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(std::iter::once(DATE_COLUMN).chain(self.columns.iter().map(String::as_str)))?;
        for row in &self.rows {
            let date = row.date.to_string();
            csv_writer.write_record(std::iter::once(date.as_str()).chain(row.values.iter().map(String::as_str)))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// 요청 컬럼만 남깁니다. 존재하는 컬럼이 하나도 없으면 그대로 둡니다.
    fn project(self, requested: &[String]) -> Self {
        let indices: Vec<usize> = requested
            .iter()
            .filter_map(|name| self.columns.iter().position(|c| c == name))
            .collect();

        if indices.is_empty() {
            if !requested.is_empty() {
                tracing::warn!(requested = ?requested, "요청한 컬럼이 없어 전체 컬럼 반환");
            }
            return self;
        }

        Self {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .into_iter()
                .map(|row| QueryRow {
                    date: row.date,
                    values: indices
                        .iter()
                        .map(|&i| row.values.get(i).cloned().unwrap_or_default())
                        .collect(),
                })
                .collect(),
        }
    }
}

/// 저장소 통계.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStatistics {
    pub total_files: usize,
    pub total_data_points: usize,
    /// (가장 오래된 날짜, 가장 최근 날짜)
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub average_daily_records: f64,
}

/// 정리 결과.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub cutoff: Option<NaiveDate>,
    pub removed: Vec<NaiveDate>,
    /// 파일 삭제 실패로 유지된 날짜
    pub failed: Vec<NaiveDate>,
}

/// 일자별 시계열 저장소.
///
/// 단일 writer를 가정합니다. 여러 실행이 같은 디렉터리를 동시에 쓰지 않도록
/// 호출자가 직렬화해야 합니다.
pub struct TimeSeriesStore {
    dir: PathBuf,
    ledger: MetadataLedger,
}

impl TimeSeriesStore {
    /// 저장소를 엽니다. 디렉터리가 없으면 생성하고, 원장이 없으면 빈 원장으로 시작합니다.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let ledger_path = dir.join(LEDGER_FILE);
        let ledger = match std::fs::read_to_string(&ledger_path) {
            Ok(text) => match serde_json::from_str::<MetadataLedger>(&text) {
                Ok(mut ledger) => {
                    if !ledger.is_consistent() {
                        tracing::warn!("원장 집계값 불일치, 재계산");
                        ledger.recompute();
                    }
                    ledger
                }
                Err(e) => {
                    tracing::warn!(path = %ledger_path.display(), error = %e, "원장 파싱 실패, 새 원장으로 시작");
                    MetadataLedger::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MetadataLedger::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self { dir, ledger })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger(&self) -> &MetadataLedger {
        &self.ledger
    }

    fn day_filename(day: NaiveDate) -> String {
        format!("daily_{}.csv", day.format("%Y-%m-%d"))
    }

    fn save_ledger(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.ledger)?;
        write_atomic(&self.dir.join(LEDGER_FILE), &json)
    }

    /// 일자 스냅샷을 씁니다. 같은 날짜가 있으면 교체합니다.
    pub fn write(&mut self, day: NaiveDate, table: &OutputTable) -> Result<LedgerEntry> {
        let filename = Self::day_filename(day);
        let path = self.dir.join(&filename);

        let mut buffer = Vec::new();
        table.write_csv(&mut buffer)?;
        write_atomic(&path, &buffer)?;

        let entry = LedgerEntry {
            date: day,
            filename,
            rows: table.len(),
            columns: table.columns().len(),
            file_size: buffer.len() as u64,
            created_at: Utc::now(),
        };

        self.ledger.upsert(entry.clone());
        self.save_ledger()?;

        tracing::info!(
            date = %day,
            rows = entry.rows,
            total_files = self.ledger.total_files,
            "일자 스냅샷 저장"
        );
        Ok(entry)
    }

    /// 하루치 스냅샷을 읽습니다.
    pub fn load_day(&self, day: NaiveDate) -> Result<OutputTable> {
        let entry = self
            .ledger
            .entry(day)
            .ok_or_else(|| DataError::NotFound(format!("{} 스냅샷 없음", day)))?;

        OutputTable::load(&self.dir.join(&entry.filename))?
            .ok_or_else(|| DataError::NotFound(entry.filename.clone()))
    }

    /// 저장된 날짜 목록 (최신순).
    pub fn available_dates(&self) -> Vec<NaiveDate> {
        self.ledger.file_list.iter().rev().map(|entry| entry.date).collect()
    }

    /// 기간 조회.
    ///
    /// `start`/`end`가 없으면 가장 오래된/최근 날짜를 사용합니다 (양 끝 포함).
    /// `columns`가 있으면 존재하는 요청 컬럼만 남깁니다.
    pub fn query(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        columns: Option<&[String]>,
    ) -> Result<QueryFrame> {
        let (Some(first), Some(last)) = (self.ledger.file_list.first(), self.ledger.file_list.last())
        else {
            return Ok(QueryFrame::default());
        };
        let start = start.unwrap_or(first.date);
        let end = end.unwrap_or(last.date);

        let mut frame = QueryFrame::default();
        let mut column_index: HashMap<String, usize> = HashMap::new();

        for entry in self
            .ledger
            .file_list
            .iter()
            .filter(|entry| entry.date >= start && entry.date <= end)
        {
            let path = self.dir.join(&entry.filename);
            let (header, records) = match read_raw(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(date = %entry.date, path = %path.display(), error = %e, "일자 파일 읽기 실패, 건너뜀");
                    continue;
                }
            };

            let positions: Vec<usize> = header
                .iter()
                .map(|name| {
                    *column_index.entry(name.clone()).or_insert_with(|| {
                        frame.columns.push(name.clone());
                        frame.columns.len() - 1
                    })
                })
                .collect();

            for record in records {
                let mut values = vec![String::new(); frame.columns.len()];
                for (value, &pos) in record.into_iter().zip(&positions) {
                    values[pos] = value;
                }
                frame.rows.push(QueryRow {
                    date: entry.date,
                    values,
                });
            }
        }

        let width = frame.columns.len();
        for row in &mut frame.rows {
            row.values.resize(width, String::new());
        }

        Ok(match columns {
            Some(requested) => frame.project(requested),
            None => frame,
        })
    }

    /// 오늘 기준으로 보관 기간이 지난 스냅샷을 삭제합니다.
    pub fn cleanup(&mut self, keep_days: u32) -> Result<CleanupReport> {
        self.cleanup_at(keep_days, Local::now().date_naive())
    }

    /// `today - keep_days`보다 오래된 스냅샷과 원장 항목을 삭제합니다.
    ///
    /// 파일 삭제에 실패한 항목은 원장에 남기고 나머지 항목은 계속 처리합니다.
    /// 보관 기간이 날짜 범위를 넘으면 아무것도 삭제하지 않습니다.
    pub fn cleanup_at(&mut self, keep_days: u32, today: NaiveDate) -> Result<CleanupReport> {
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(keep_days)))
            .unwrap_or(NaiveDate::MIN);
        let mut report = CleanupReport {
            cutoff: Some(cutoff),
            ..Default::default()
        };

        let mut kept = Vec::with_capacity(self.ledger.file_list.len());
        for entry in std::mem::take(&mut self.ledger.file_list) {
            if entry.date >= cutoff {
                kept.push(entry);
                continue;
            }

            match std::fs::remove_file(self.dir.join(&entry.filename)) {
                Ok(()) => report.removed.push(entry.date),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => report.removed.push(entry.date),
                Err(e) => {
                    tracing::warn!(date = %entry.date, error = %e, "스냅샷 삭제 실패, 항목 유지");
                    report.failed.push(entry.date);
                    kept.push(entry);
                }
            }
        }

        self.ledger.file_list = kept;
        self.ledger.recompute();
        self.save_ledger()?;

        tracing::info!(
            cutoff = %cutoff,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "오래된 스냅샷 정리"
        );
        Ok(report)
    }

    /// 저장소 통계.
    pub fn statistics(&self) -> StoreStatistics {
        let files = &self.ledger.file_list;
        let date_range = files.first().zip(files.last()).map(|(a, b)| (a.date, b.date));
        let average_daily_records = if files.is_empty() {
            0.0
        } else {
            self.ledger.data_points as f64 / files.len() as f64
        };

        StoreStatistics {
            total_files: self.ledger.total_files,
            total_data_points: self.ledger.data_points,
            date_range,
            average_daily_records,
        }
    }
}

/// 헤더와 레코드를 문자열 그대로 읽습니다.
fn read_raw(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let header = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let records = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

    Ok((header, records))
}
