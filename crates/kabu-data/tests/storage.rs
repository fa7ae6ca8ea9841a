//! 파일 저장소 통합 테스트 (시계열 원장, 보관 기간, 파생 뷰 캐시)

use std::fs::File;
use std::time::{Duration, SystemTime};

use chrono::{Duration as Days, NaiveDate};
use kabu_core::FetchResult;
use kabu_data::{
    build_sector_view, load_classification, DerivedViewCache, OutputTable, SectorView,
    TimeSeriesStore,
};
use rust_decimal_macros::dec;

fn table(codes: &[&str]) -> OutputTable {
    OutputTable::from_results(codes.iter().map(|code| {
        let mut result = FetchResult::empty(code.parse().unwrap());
        result.price = Some(dec!(100));
        result.status = result.infer_status();
        result
    }))
}

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[test]
fn test_ledger_stays_consistent_across_writes_and_cleanups() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TimeSeriesStore::open(dir.path()).unwrap();
    let today = day("2024-06-30");

    let steps: [(i64, &[&str]); 5] = [
        (100, &["1301"]),
        (50, &["1301", "7203"]),
        (50, &["1301", "7203", "9984"]),
        (5, &["1301"]),
        (0, &["1301", "7203"]),
    ];

    for (age, codes) in steps {
        store.write(today - Days::days(age), &table(codes)).unwrap();
        let ledger = store.ledger();
        assert_eq!(ledger.total_files, ledger.file_list.len());
        assert_eq!(ledger.data_points, ledger.file_list.iter().map(|e| e.rows).sum::<usize>());
    }

    assert_eq!(store.ledger().total_files, 4);
    assert_eq!(store.ledger().data_points, 1 + 3 + 1 + 2);

    store.cleanup_at(60, today).unwrap();
    let ledger = store.ledger();
    assert_eq!(ledger.total_files, 3);
    assert_eq!(ledger.data_points, 3 + 1 + 2);
    assert!(!dir.path().join("daily_2024-03-22.csv").exists());

    // 디스크의 원장도 같은 상태
    let reopened = TimeSeriesStore::open(dir.path()).unwrap();
    assert_eq!(reopened.ledger().file_list, store.ledger().file_list);
}

#[test]
fn test_cleanup_removes_only_expired_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TimeSeriesStore::open(dir.path()).unwrap();
    let today = day("2024-06-30");

    store.write(today - Days::days(40), &table(&["1301"])).unwrap();
    store.write(today - Days::days(10), &table(&["7203"])).unwrap();

    let report = store.cleanup_at(30, today).unwrap();

    assert_eq!(report.removed, vec![day("2024-05-21")]);
    assert!(report.failed.is_empty());
    assert_eq!(store.available_dates(), vec![day("2024-06-20")]);
}

#[test]
fn test_cleanup_failure_keeps_entry_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TimeSeriesStore::open(dir.path()).unwrap();
    let today = day("2024-06-30");

    store.write(day("2024-05-01"), &table(&["1301"])).unwrap();
    store.write(day("2024-05-02"), &table(&["1301", "7203"])).unwrap();
    store.write(day("2024-06-29"), &table(&["9984"])).unwrap();

    // 삭제할 수 없는 일자 파일: 비어 있지 않은 디렉터리로 교체
    let blocked = dir.path().join("daily_2024-05-01.csv");
    std::fs::remove_file(&blocked).unwrap();
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("keep.txt"), "x").unwrap();

    let report = store.cleanup_at(30, today).unwrap();

    assert_eq!(report.removed, vec![day("2024-05-02")]);
    assert_eq!(report.failed, vec![day("2024-05-01")]);
    assert!(!dir.path().join("daily_2024-05-02.csv").exists());
    assert!(store.ledger().entry(day("2024-05-01")).is_some());
    assert!(store.ledger().entry(day("2024-05-02")).is_none());
    assert!(store.ledger().is_consistent());
    assert_eq!(store.ledger().data_points, 1 + 1);

    let reopened = TimeSeriesStore::open(dir.path()).unwrap();
    assert!(reopened.ledger().is_consistent());
    assert_eq!(reopened.ledger().file_list, store.ledger().file_list);
}

#[test]
fn test_cleanup_with_unbounded_keep_days_removes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TimeSeriesStore::open(dir.path()).unwrap();

    let empty = store.cleanup(u32::MAX).unwrap();
    assert!(empty.removed.is_empty());

    store.write(day("2000-01-01"), &table(&["1301"])).unwrap();
    let report = store.cleanup_at(u32::MAX, day("2024-06-30")).unwrap();

    assert_eq!(report.cutoff, Some(NaiveDate::MIN));
    assert!(report.removed.is_empty());
    assert_eq!(store.available_dates(), vec![day("2000-01-01")]);
}

#[test]
fn test_query_strips_bom_from_day_header() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TimeSeriesStore::open(dir.path()).unwrap();
    store.write(day("2024-01-04"), &table(&["1301"])).unwrap();
    std::fs::write(
        dir.path().join("daily_2024-01-04.csv"),
        "\u{feff}code,price\n1301,3000\n",
    )
    .unwrap();

    let columns = vec!["code".to_string()];
    let frame = store.query(None, None, Some(&columns)).unwrap();

    assert_eq!(frame.columns, vec!["code".to_string()]);
    assert_eq!(frame.value(&frame.rows[0], "code"), Some("1301"));
}

#[test]
fn test_query_tags_dates_projects_and_skips_missing_days() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TimeSeriesStore::open(dir.path()).unwrap();

    store.write(day("2024-01-04"), &table(&["1301", "7203"])).unwrap();
    store.write(day("2024-01-05"), &table(&["1301"])).unwrap();
    store.write(day("2024-01-06"), &table(&["9984"])).unwrap();
    std::fs::remove_file(dir.path().join("daily_2024-01-05.csv")).unwrap();

    let columns = vec!["code".to_string(), "price".to_string(), "volume".to_string()];
    let frame = store.query(None, None, Some(&columns)).unwrap();

    assert_eq!(frame.columns, vec!["code".to_string(), "price".to_string()]);
    let dates: Vec<NaiveDate> = frame.rows.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![day("2024-01-04"), day("2024-01-04"), day("2024-01-06")]);
    assert_eq!(frame.value(&frame.rows[2], "code"), Some("9984"));

    let bounded = store.query(Some(day("2024-01-05")), None, None).unwrap();
    assert_eq!(bounded.len(), 1);
    assert!(bounded.columns.contains(&"status".to_string()));

    let mut out = Vec::new();
    frame.write_csv(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("date,code,price\n2024-01-04,1301,100\n"));
}

#[test]
fn test_statistics_fold_over_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TimeSeriesStore::open(dir.path()).unwrap();

    let empty = store.statistics();
    assert_eq!(empty.total_files, 0);
    assert_eq!(empty.date_range, None);

    store.write(day("2024-01-04"), &table(&["1301", "7203"])).unwrap();
    store.write(day("2024-01-05"), &table(&["1301"])).unwrap();

    let stats = store.statistics();
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.total_data_points, 3);
    assert_eq!(stats.date_range, Some((day("2024-01-04"), day("2024-01-05"))));
    assert!((stats.average_daily_records - 1.5).abs() < f64::EPSILON);
}

fn classification_file(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("classification.csv");
    std::fs::write(&path, "コード,銘柄名,33業種区分\n1301,極洋,水産・農林業\n1305,ETF,-\n").unwrap();
    path
}

fn build(dir: &std::path::Path) -> kabu_data::Result<SectorView> {
    let mut result = FetchResult::empty("1301".parse().unwrap());
    result.price = Some(dec!(3000));
    result.expected_per = Some(dec!(10));
    result.expected_roe = Some(dec!(9));
    result.expected_dividend_yield = Some(dec!(2.5));

    let classification = load_classification(&classification_file(dir))?;
    Ok(build_sector_view(&OutputTable::from_results(vec![result]), &classification))
}

#[test]
fn test_view_cache_reuses_fresh_artifact_and_rebuilds_stale() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DerivedViewCache::new(dir.path().join("view.json"), Duration::from_secs(24 * 3600));

    let first = cache.get_or_build(|| build(dir.path())).unwrap();
    assert_eq!(first.bucket_sizes(), vec![("水産・農林業", 1)]);
    assert_eq!(first.sectors["水産・農林業"][0].pbr_indicator, dec!(0.9));

    // 유효한 캐시: 빌드 함수가 호출되지 않음
    let cached: SectorView = cache
        .get_or_build(|| panic!("fresh cache must not rebuild"))
        .unwrap();
    assert_eq!(cached, first);

    // 24시간 + 1초 전으로 수정 시각 변경 → 재생성
    let stale = SystemTime::now() - Duration::from_secs(24 * 3600 + 1);
    File::options()
        .write(true)
        .open(cache.path())
        .unwrap()
        .set_modified(stale)
        .unwrap();
    assert!(!cache.is_valid());

    let mut rebuilt = false;
    cache
        .get_or_build(|| {
            rebuilt = true;
            build(dir.path())
        })
        .unwrap();
    assert!(rebuilt);
    assert!(cache.is_valid());

    cache.invalidate().unwrap();
    assert!(!cache.path().exists());
}
