//! 종목 상세 페이지 병렬 수집.
//!
//! 고정 크기 작업자 풀이 공유 큐에서 `(index, code)`를 하나씩 꺼내 처리합니다.
//! 각 작업은 전용 세션을 열고, 필드 단위로 추출한 뒤 어떤 경로로 끝나든 세션을 닫습니다.
//!
//! ## 실패 처리
//! - 필드 추출 실패: 해당 필드만 `None`
//! - 세션 열기 실패, 세션 오류, 작업 시간 초과: `FetchResult::failed`
//! - 작업자 panic: 진행 중이던 종목은 `Failed`로 채워 결과 개수를 보존
//!
//! 취소는 협조적입니다. 취소 토큰이나 배치 마감 시간은 새 작업의 시작만 막고,
//! 진행 중인 작업은 끝까지 수행합니다.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use kabu_core::{fetch_span, FetchResult, FieldSpec, FieldValue, StockCode};
use kabu_data::{DetailSession, DetailSource, ExtractError};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::FetchConfig;

/// 요소 대기 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 시간 초과 후 추가 시도 횟수
    pub max_retries: u32,
    /// 재시도 간 고정 딜레이
    pub retry_delay: Duration,
    /// 시도 한 번의 대기 시간
    pub element_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
            element_timeout: Duration::from_secs(15),
        }
    }
}

/// 수집기 옵션.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// 동시 작업 수
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// 종목 하나의 전체 작업 시간
    pub task_timeout: Duration,
    /// 배치 마감 시간 (실행 시작 기준)
    pub deadline: Option<Duration>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            task_timeout: Duration::from_secs(120),
            deadline: None,
        }
    }
}

impl From<&FetchConfig> for ExecutorOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                retry_delay: config.retry_delay(),
                element_timeout: config.element_timeout(),
            },
            task_timeout: config.task_timeout(),
            deadline: config.batch_deadline(),
        }
    }
}

/// 배치 수집 결과.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    /// 시작된 모든 종목의 결과 (입력 순서)
    pub results: Vec<FetchResult>,
    /// 취소/마감으로 시작하지 못한 종목
    pub unscheduled: Vec<StockCode>,
}

impl FetchBatch {
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }
}

/// 작업 슬롯 상태. 입력 인덱스마다 하나씩 존재합니다.
#[derive(Debug)]
enum Slot {
    Pending,
    Started,
    Done(FetchResult),
}

/// 상세 페이지 병렬 수집기.
pub struct FetchExecutor {
    source: Arc<dyn DetailSource>,
    options: ExecutorOptions,
    cancel: CancellationToken,
}

impl FetchExecutor {
    pub fn new(source: Arc<dyn DetailSource>, options: ExecutorOptions) -> Self {
        Self {
            source,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// 외부 취소 토큰을 사용합니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// 종목 목록을 수집합니다.
    ///
    /// 모든 작업자가 끝난 뒤에 반환하며, 결과는 입력 순서를 따릅니다.
    pub async fn run(&self, codes: &[StockCode]) -> FetchBatch {
        if codes.is_empty() {
            return FetchBatch::default();
        }

        let concurrency = self.options.concurrency.clamp(1, codes.len());
        let deadline = self.options.deadline.map(|d| Instant::now() + d);
        let started = Instant::now();

        info!(
            source = self.source.name(),
            total = codes.len(),
            concurrency,
            "상세 페이지 수집 시작"
        );

        let queue: Arc<Mutex<VecDeque<(usize, StockCode)>>> =
            Arc::new(Mutex::new(codes.iter().copied().enumerate().collect()));
        let slots: Arc<Mutex<Vec<Slot>>> =
            Arc::new(Mutex::new(codes.iter().map(|_| Slot::Pending).collect()));

        let mut workers = JoinSet::new();
        for worker_id in 0..concurrency {
            let worker = Worker {
                id: worker_id,
                source: Arc::clone(&self.source),
                queue: Arc::clone(&queue),
                slots: Arc::clone(&slots),
                retry: self.options.retry,
                task_timeout: self.options.task_timeout,
                cancel: self.cancel.clone(),
                deadline,
            };
            workers.spawn(worker.run());
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "작업자 비정상 종료");
            }
        }

        let slots = std::mem::take(&mut *slots.lock().await);
        let mut batch = FetchBatch::default();
        for (slot, code) in slots.into_iter().zip(codes) {
            match slot {
                Slot::Done(result) => batch.results.push(result),
                Slot::Started => {
                    warn!(code = %code, "작업 중 중단됨, 실패로 기록");
                    batch.results.push(FetchResult::failed(*code));
                }
                Slot::Pending => batch.unscheduled.push(*code),
            }
        }

        if !batch.is_complete() {
            warn!(
                unscheduled = batch.unscheduled.len(),
                "취소 또는 마감으로 시작하지 못한 종목이 있습니다"
            );
        }
        info!(
            results = batch.results.len(),
            elapsed = format!("{:.1}s", started.elapsed().as_secs_f64()),
            "상세 페이지 수집 종료"
        );

        batch
    }
}

struct Worker {
    id: usize,
    source: Arc<dyn DetailSource>,
    queue: Arc<Mutex<VecDeque<(usize, StockCode)>>>,
    slots: Arc<Mutex<Vec<Slot>>>,
    retry: RetryPolicy,
    task_timeout: Duration,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Worker {
    async fn run(self) {
        loop {
            if self.cancel.is_cancelled() {
                debug!(worker = self.id, "취소 요청, 작업자 종료");
                break;
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(worker = self.id, "배치 마감 시간 도달, 작업자 종료");
                break;
            }

            let next = self.queue.lock().await.pop_front();
            let Some((index, code)) = next else {
                break;
            };

            self.set_slot(index, Slot::Started).await;
            let result = fetch_code(self.source.as_ref(), code, &self.retry, self.task_timeout)
                .instrument(fetch_span!("fetch", code, index))
                .await;
            self.set_slot(index, Slot::Done(result)).await;
        }
    }

    async fn set_slot(&self, index: usize, slot: Slot) {
        if let Some(entry) = self.slots.lock().await.get_mut(index) {
            *entry = slot;
        }
    }
}

/// 종목 하나를 수집합니다. 세션은 모든 경로에서 닫힙니다.
async fn fetch_code(
    source: &dyn DetailSource,
    code: StockCode,
    retry: &RetryPolicy,
    task_timeout: Duration,
) -> FetchResult {
    let started = Instant::now();

    let mut session = match timeout(task_timeout, source.open(code)).await {
        Ok(Ok(session)) => session,
        Ok(Err(e)) => {
            warn!(error = %e, "세션 열기 실패");
            return FetchResult::failed(code);
        }
        Err(_) => {
            warn!("세션 열기 시간 초과");
            return FetchResult::failed(code);
        }
    };

    let remaining = task_timeout.saturating_sub(started.elapsed());
    let outcome = timeout(remaining, extract_fields(&mut *session, code, retry)).await;
    session.close().await;

    match outcome {
        Ok(Ok(result)) => {
            debug!(status = %result.status, "수집 완료");
            result
        }
        Ok(Err(e)) => {
            warn!(error = %e, "세션 오류로 작업 중단");
            FetchResult::failed(code)
        }
        Err(_) => {
            warn!(timeout_secs = task_timeout.as_secs(), "작업 시간 초과");
            FetchResult::failed(code)
        }
    }
}

/// 모든 필드를 순서대로 추출합니다. 세션 오류만 작업 전체를 중단시킵니다.
async fn extract_fields(
    session: &mut dyn DetailSession,
    code: StockCode,
    retry: &RetryPolicy,
) -> Result<FetchResult, ExtractError> {
    let mut result = FetchResult::empty(code);

    for field in FieldSpec::ALL {
        match wait_with_retry(session, field, retry).await {
            Ok(value) => {
                if !result.apply(field, value) {
                    debug!(field = %field, "값 종류 불일치, 무시");
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!(field = %field, error = %e, "필드 추출 실패"),
        }
    }

    result.status = result.infer_status();
    Ok(result)
}

/// 요소 대기를 재시도와 함께 수행합니다.
///
/// 시도마다 `element_timeout`을 적용하고, 시간 초과일 때만 `retry_delay` 후
/// 최대 `max_retries`번 다시 시도합니다. 다른 오류는 즉시 반환합니다.
pub async fn wait_with_retry(
    session: &mut dyn DetailSession,
    field: FieldSpec,
    policy: &RetryPolicy,
) -> Result<FieldValue, ExtractError> {
    let mut attempt = 0;
    loop {
        match timeout(policy.element_timeout, session.extract(field)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !e.is_timeout() => return Err(e),
            Ok(Err(_)) | Err(_) => {}
        }

        if attempt >= policy.max_retries {
            return Err(ExtractError::Timeout(field));
        }
        attempt += 1;
        debug!(field = %field, attempt, "요소 대기 시간 초과, 재시도");
        tokio::time::sleep(policy.retry_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 지정 횟수만큼 시간 초과 후 값을 돌려주는 세션.
    struct FlakySession {
        timeouts_left: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DetailSession for FlakySession {
        async fn extract(&mut self, field: FieldSpec) -> Result<FieldValue, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.timeouts_left > 0 {
                self.timeouts_left -= 1;
                return Err(ExtractError::Timeout(field));
            }
            Ok(FieldValue::Text("極洋".into()))
        }

        async fn close(self: Box<Self>) {}
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_delay: Duration::from_millis(10),
            element_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_wait_with_retry_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = FlakySession {
            timeouts_left: 1,
            calls: Arc::clone(&calls),
        };

        let value = wait_with_retry(&mut session, FieldSpec::Name, &policy(1)).await;

        assert_eq!(value.unwrap(), FieldValue::Text("極洋".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wait_with_retry_gives_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = FlakySession {
            timeouts_left: 5,
            calls: Arc::clone(&calls),
        };

        let value = wait_with_retry(&mut session, FieldSpec::Price, &policy(1)).await;

        assert!(matches!(value, Err(ExtractError::Timeout(FieldSpec::Price))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct HangingSession;

    #[async_trait]
    impl DetailSession for HangingSession {
        async fn extract(&mut self, _field: FieldSpec) -> Result<FieldValue, ExtractError> {
            std::future::pending().await
        }

        async fn close(self: Box<Self>) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_with_retry_applies_element_timeout() {
        let value = wait_with_retry(&mut HangingSession, FieldSpec::ExpectedRoe, &policy(2)).await;
        assert!(matches!(value, Err(ExtractError::Timeout(FieldSpec::ExpectedRoe))));
    }

    #[tokio::test]
    async fn test_wait_with_retry_does_not_retry_missing() {
        struct MissingSession(usize);

        #[async_trait]
        impl DetailSession for MissingSession {
            async fn extract(&mut self, field: FieldSpec) -> Result<FieldValue, ExtractError> {
                self.0 += 1;
                Err(ExtractError::Missing(field))
            }

            async fn close(self: Box<Self>) {}
        }

        let mut session = MissingSession(0);
        let value = wait_with_retry(&mut session, FieldSpec::LatestNews, &policy(3)).await;

        assert!(matches!(value, Err(ExtractError::Missing(_))));
        assert_eq!(session.0, 1);
    }
}
