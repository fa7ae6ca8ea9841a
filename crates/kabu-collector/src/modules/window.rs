//! 재개/구간 선택.
//!
//! 적용 순서: 재개 필터 → 시작 코드 → 시작 인덱스 → 개수 제한.
//! 결과가 비어 있으면 "할 일 없음"이며 오류가 아닙니다.

use std::collections::HashSet;

use kabu_core::StockCode;
use kabu_data::OutputTable;
use tracing::{info, warn};

/// 구간 선택 옵션.
#[derive(Debug, Clone, Default)]
pub struct WindowOptions {
    /// 앞에서부터 건너뛸 종목 수
    pub start_index: Option<usize>,
    /// 이 코드부터 시작 (찾지 못하면 `start_index`로 대체)
    pub start_code: Option<StockCode>,
    /// 최대 종목 수
    pub limit: Option<usize>,
    /// 기존 테이블에 있는 종목 건너뛰기
    pub resume: bool,
}

/// 구간 선택 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Window {
    pub codes: Vec<StockCode>,
    /// 재개 모드로 제외된 종목 수
    pub skipped: usize,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// 수집할 종목 구간을 선택합니다.
pub fn select_window(
    universe: &[StockCode],
    existing: Option<&OutputTable>,
    options: &WindowOptions,
) -> Window {
    let mut codes: Vec<StockCode> = universe.to_vec();
    let mut skipped = 0;

    if options.resume {
        match existing {
            Some(table) => {
                let done: HashSet<StockCode> = table.codes().into_iter().collect();
                let before = codes.len();
                codes.retain(|code| !done.contains(code));
                skipped = before - codes.len();
                info!(skipped, remaining = codes.len(), "재개 모드: 수집 완료 종목 제외");
            }
            None => info!("재개 모드: 기존 테이블 없음, 처음부터 시작"),
        }
    }

    let mut start_resolved = false;
    if let Some(start_code) = options.start_code {
        match codes.iter().position(|code| *code == start_code) {
            Some(position) => {
                codes.drain(..position);
                start_resolved = true;
            }
            None => warn!(start_code = %start_code, "시작 코드를 찾을 수 없음, 무시"),
        }
    }

    if !start_resolved {
        if let Some(start_index) = options.start_index {
            let start_index = start_index.min(codes.len());
            codes.drain(..start_index);
        }
    }

    if let Some(limit) = options.limit {
        codes.truncate(limit);
    }

    Window { codes, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kabu_core::FetchResult;

    fn codes(raw: &[&str]) -> Vec<StockCode> {
        raw.iter().map(|c| c.parse::<StockCode>().unwrap()).collect()
    }

    fn table(raw: &[&str]) -> OutputTable {
        OutputTable::from_results(codes(raw).into_iter().map(FetchResult::empty))
    }

    #[test]
    fn test_resume_skips_existing() {
        let universe = codes(&["1001", "1002", "1003", "1004"]);
        let existing = table(&["1001", "1002"]);
        let options = WindowOptions {
            resume: true,
            ..Default::default()
        };

        let window = select_window(&universe, Some(&existing), &options);

        assert_eq!(window.codes, codes(&["1003", "1004"]));
        assert_eq!(window.skipped, 2);
    }

    #[test]
    fn test_resume_without_existing_table() {
        let universe = codes(&["1001", "1002"]);
        let options = WindowOptions {
            resume: true,
            ..Default::default()
        };

        assert_eq!(select_window(&universe, None, &options).codes, universe);
    }

    #[test]
    fn test_start_code_and_limit() {
        let universe = codes(&["1001", "1002", "1003", "1004", "1005"]);
        let options = WindowOptions {
            start_code: Some("1003".parse().unwrap()),
            limit: Some(1),
            ..Default::default()
        };

        assert_eq!(select_window(&universe, None, &options).codes, codes(&["1003"]));
    }

    #[test]
    fn test_start_code_applies_after_resume_filter() {
        let universe = codes(&["1001", "1002", "1003", "1004"]);
        let existing = table(&["1001", "1003"]);
        let options = WindowOptions {
            resume: true,
            start_code: Some("1002".parse().unwrap()),
            ..Default::default()
        };

        let window = select_window(&universe, Some(&existing), &options);
        assert_eq!(window.codes, codes(&["1002", "1004"]));
    }

    #[test]
    fn test_unknown_start_code_falls_back_to_index() {
        let universe = codes(&["1001", "1002", "1003"]);
        let options = WindowOptions {
            start_code: Some("9999".parse().unwrap()),
            start_index: Some(1),
            ..Default::default()
        };
        assert_eq!(select_window(&universe, None, &options).codes, codes(&["1002", "1003"]));

        let options = WindowOptions {
            start_code: Some("9999".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(select_window(&universe, None, &options).codes, universe);
    }

    #[test]
    fn test_start_code_takes_precedence_over_index() {
        let universe = codes(&["1001", "1002", "1003"]);
        let options = WindowOptions {
            start_code: Some("1002".parse().unwrap()),
            start_index: Some(2),
            ..Default::default()
        };

        assert_eq!(select_window(&universe, None, &options).codes, codes(&["1002", "1003"]));
    }

    #[test]
    fn test_start_index_past_end_is_nothing_to_do() {
        let universe = codes(&["1001", "1002"]);
        let options = WindowOptions {
            start_index: Some(10),
            ..Default::default()
        };

        assert!(select_window(&universe, None, &options).is_empty());
    }
}
