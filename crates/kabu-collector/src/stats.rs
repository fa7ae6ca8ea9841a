//! 수집 통계 구조체.

use kabu_core::{FetchResult, FetchStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 수집 시도 종목 수
    pub total: usize,
    /// 모든 지표 수집 성공
    pub ok: usize,
    /// 일부 지표만 수집
    pub partial: usize,
    /// 작업 전체 실패
    pub failed: usize,
    /// 정규화에서 거부된 원시 코드 수
    pub rejected: usize,
    /// 재개 모드 등으로 건너뛴 종목 수
    pub skipped: usize,
    /// 취소/마감으로 시작하지 못한 종목 수
    pub unscheduled: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 수집 결과를 상태별로 집계합니다.
    pub fn record(&mut self, results: &[FetchResult]) {
        for result in results {
            self.total += 1;
            match result.status {
                FetchStatus::Ok => self.ok += 1,
                FetchStatus::Partial => self.partial += 1,
                FetchStatus::Failed => self.failed += 1,
            }
        }
    }

    /// 성공률 계산 (%). 부분 수집도 성공으로 셉니다.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            ((self.ok + self.partial) as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            ok = self.ok,
            partial = self.partial,
            failed = self.failed,
            rejected = self.rejected,
            skipped = self.skipped,
            unscheduled = self.unscheduled,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
