//! 상장 종목 코드 Provider와 fallback 체인.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{DataError, Result};

/// 상장 종목 코드 Provider trait.
///
/// 정규화 전의 원시 코드 목록을 반환합니다. 전송 방식(API, 페이지, 파일)은
/// 구현체가 결정합니다.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    /// Provider 이름 (`AcquireMethod::Named`와 비교할 때 사용).
    fn name(&self) -> &str;

    /// 원시 코드 목록 조회.
    async fn fetch_universe(&self) -> Result<Vec<String>>;
}

/// 코드 취득 방식.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AcquireMethod {
    /// 우선순위 순서로 시도
    #[default]
    Auto,
    /// 지정한 Provider만 사용
    Named(String),
}

impl FromStr for AcquireMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s.is_empty() || s == "auto" {
            Ok(Self::Auto)
        } else {
            Ok(Self::Named(s))
        }
    }
}

impl fmt::Display for AcquireMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Provider fallback 체인.
///
/// `Auto`는 등록 순서대로 시도하여 처음으로 비어 있지 않은 결과를 반환합니다.
/// 오류나 빈 결과는 경고 후 다음 Provider로 넘어가며, 모두 실패하면 빈 목록을
/// 반환합니다. 빈 목록을 치명적 오류로 볼지는 호출자가 결정합니다.
#[derive(Default)]
pub struct UniverseChain {
    providers: Vec<Box<dyn UniverseProvider>>,
}

impl UniverseChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider 추가 (builder).
    pub fn with_provider(mut self, provider: impl UniverseProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// 등록된 Provider 이름 (우선순위 순).
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// 원시 코드 목록을 취득합니다.
    pub async fn acquire(&self, method: &AcquireMethod) -> Vec<String> {
        match method {
            AcquireMethod::Auto => {
                for provider in &self.providers {
                    if let Some(codes) = Self::try_provider(provider.as_ref()).await {
                        return codes;
                    }
                }

                tracing::warn!(
                    providers = ?self.names(),
                    "모든 Provider에서 종목 코드 취득 실패"
                );
                Vec::new()
            }
            AcquireMethod::Named(name) => {
                let provider = self
                    .providers
                    .iter()
                    .find(|p| p.name().eq_ignore_ascii_case(name));

                match provider {
                    Some(provider) => Self::try_provider(provider.as_ref())
                        .await
                        .unwrap_or_default(),
                    None => {
                        tracing::warn!(
                            method = %name,
                            available = ?self.names(),
                            "알 수 없는 취득 방식"
                        );
                        Vec::new()
                    }
                }
            }
        }
    }

    async fn try_provider(provider: &dyn UniverseProvider) -> Option<Vec<String>> {
        tracing::info!(provider = provider.name(), "종목 코드 취득 중");

        match provider.fetch_universe().await {
            Ok(codes) if !codes.is_empty() => {
                tracing::info!(
                    provider = provider.name(),
                    count = codes.len(),
                    "종목 코드 취득 완료"
                );
                Some(codes)
            }
            Ok(_) => {
                tracing::warn!(provider = provider.name(), "빈 목록 반환, 다음 Provider 시도");
                None
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    error = %e,
                    "종목 코드 취득 실패, 다음 Provider 시도"
                );
                None
            }
        }
    }
}

/// 로컬 코드 파일 Provider.
///
/// 한 줄에 하나의 코드 (헤더 없음). 쉼표가 있으면 첫 필드만 사용합니다.
pub struct LocalFileProvider {
    path: PathBuf,
}

impl LocalFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 코드 파일 내용을 원시 코드 목록으로 분리합니다.
pub(crate) fn parse_code_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split(',').next())
        .map(|field| field.trim().trim_matches('"').trim_start_matches('\u{feff}'))
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl UniverseProvider for LocalFileProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch_universe(&self) -> Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(parse_code_lines(&content))
    }
}
