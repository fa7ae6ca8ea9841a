//! TSE Prime 펀더멘털 수집기 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 전체 수집 (J-Quants → JPX → 로컬 파일 순서로 코드 취득)
//! kabu-collector run
//!
//! # 중단된 수집 재개, 동시 작업 2개
//! kabu-collector run --resume --concurrency 2
//!
//! # 특정 코드부터 100종목만
//! kabu-collector run --start-code 7203 --limit 100
//!
//! # 기간 조회 (CSV 출력)
//! kabu-collector query --start 2024-01-01 --end 2024-01-31 --columns price,expected_per
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use kabu_collector::modules::{self, ExecutorOptions, FetchExecutor, RunOptions, WindowOptions};
use kabu_collector::CollectorConfig;
use kabu_core::logging::{init_logging, LogConfig};
use kabu_core::StockCode;
use kabu_data::{build_http_client, AcquireMethod, DetailSource, NikkeiSource};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "kabu-collector")]
#[command(about = "TSE Prime fundamentals collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error). RUST_LOG가 있으면 무시됩니다
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 전체 수집 (코드 취득 → 상세 수집 → 병합 → 일자 스냅샷)
    Run {
        /// 코드 취득 방식 (auto, jquants, jpx, local)
        #[arg(short, long, default_value = "auto")]
        method: AcquireMethod,

        /// 앞에서부터 건너뛸 종목 수
        #[arg(long)]
        start_index: Option<usize>,

        /// 이 코드부터 시작 (예: 7203)
        #[arg(long)]
        start_code: Option<StockCode>,

        /// 최대 종목 수
        #[arg(short, long)]
        limit: Option<usize>,

        /// 출력 테이블에 이미 있는 종목 건너뛰기
        #[arg(long)]
        resume: bool,

        /// 동시 작업 수 (기본: FETCH_CONCURRENCY)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// 종목 코드만 취득하여 코드 파일과 백업 저장
    FetchCodes {
        /// 코드 취득 방식 (auto, jquants, jpx, local)
        #[arg(short, long, default_value = "auto")]
        method: AcquireMethod,
    },

    /// 시계열 저장소 통계
    History,

    /// 시계열 기간 조회 (CSV 출력)
    Query {
        /// 시작 날짜 (YYYY-MM-DD, 기본: 가장 오래된 날짜)
        #[arg(short, long)]
        start: Option<NaiveDate>,

        /// 종료 날짜 (YYYY-MM-DD, 기본: 가장 최근 날짜)
        #[arg(short, long)]
        end: Option<NaiveDate>,

        /// 조회 컬럼 (쉼표로 구분, 예: "code,price")
        #[arg(long)]
        columns: Option<String>,

        /// 출력 파일 (없으면 stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 보관 기간이 지난 스냅샷 삭제
    Cleanup {
        /// 보관 일수 (기본: HISTORY_KEEP_DAYS)
        #[arg(long)]
        keep_days: Option<u32>,
    },

    /// 업종별 파생 뷰 (24시간 캐시)
    View {
        /// 캐시를 무시하고 다시 생성
        #[arg(long)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    let mut log_config = LogConfig::from_env();
    if let Some(level) = &cli.log_level {
        log_config.level = format!("kabu_collector={0},kabu_data={0},kabu_core={0}", level);
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Kabu Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env().context("설정 로드 실패")?;
    tracing::debug!(paths = ?config.paths, fetch = ?config.fetch, "설정 로드 완료");

    // 명령 실행
    match cli.command {
        Commands::Run {
            method,
            start_index,
            start_code,
            limit,
            resume,
            concurrency,
        } => {
            let client = build_http_client(config.fetch.request_timeout())?;
            let chain = modules::build_universe_chain(&config, &client);

            let mut executor_options = ExecutorOptions::from(&config.fetch);
            if let Some(concurrency) = concurrency {
                executor_options.concurrency = concurrency.max(1);
            }
            let source: Arc<dyn DetailSource> = Arc::new(NikkeiSource::new(
                client,
                config.sources.nikkei_base_url.clone(),
            ));
            let executor = FetchExecutor::new(source, executor_options);
            cancel_on_ctrl_c(executor.cancellation_token());

            let options = RunOptions {
                method,
                window: WindowOptions {
                    start_index,
                    start_code,
                    limit,
                    resume,
                },
            };

            let report = modules::run_collection(
                &chain,
                &executor,
                &config.paths,
                &options,
                Local::now().date_naive(),
            )
            .await?;

            if report.nothing_to_do {
                tracing::info!("수집할 종목이 없습니다");
            } else {
                report.stats.log_summary("펀더멘털 수집");
                if report.merge_fallback {
                    tracing::warn!("기존 테이블과 병합하지 못해 이번 결과만 저장했습니다");
                }
            }
        }
        Commands::FetchCodes { method } => {
            let client = build_http_client(config.fetch.request_timeout())?;
            let chain = modules::build_universe_chain(&config, &client);

            let report = modules::sync_codes(&chain, &method, &config, Local::now()).await?;
            println!(
                "종목 코드 {}개 저장: {} (백업: {})",
                report.normalized.codes.len(),
                report.codes_file.display(),
                report.backup_file.display()
            );
        }
        Commands::History => {
            let stats = modules::history_statistics(&config.paths)?;
            println!("파일 수: {}", stats.total_files);
            println!("데이터 포인트: {}", stats.total_data_points);
            if let Some((first, last)) = stats.date_range {
                println!("기간: {} ~ {}", first, last);
            }
            println!("일평균 레코드: {:.1}", stats.average_daily_records);
        }
        Commands::Query {
            start,
            end,
            columns,
            output,
        } => {
            let columns: Option<Vec<String>> = columns.map(|c| {
                c.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });
            let frame = modules::query_history(&config.paths, start, end, columns.as_deref())?;

            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("출력 파일 생성 실패: {}", path.display()))?;
                    frame.write_csv(file)?;
                    tracing::info!(path = %path.display(), rows = frame.len(), "조회 결과 저장");
                }
                None => frame.write_csv(std::io::stdout().lock())?,
            }
        }
        Commands::Cleanup { keep_days } => {
            let keep_days = keep_days.unwrap_or(config.retention.keep_days);
            let report = modules::cleanup_history(&config.paths, keep_days)?;
            println!(
                "삭제: {}개, 실패: {}개",
                report.removed.len(),
                report.failed.len()
            );
        }
        Commands::View { refresh } => {
            let view = modules::sector_view(&config.paths, config.view.cache_ttl(), refresh)?;
            for (sector, rows) in view.bucket_sizes() {
                println!("{}\t{}", sector, rows);
            }
        }
    }

    tracing::info!("Kabu Collector 종료");
    Ok(())
}

/// Ctrl-C 수신 시 토큰을 취소합니다. 진행 중인 작업은 끝까지 수행합니다.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("종료 신호 수신, 새 작업 시작 중단");
            cancel.cancel();
        }
    });
}
