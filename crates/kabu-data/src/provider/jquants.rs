//! J-Quants API 종목 Provider.
//!
//! refresh token으로 ID 토큰을 발급받아 상장 종목 정보를 조회하고
//! 프라임 시장 종목만 반환합니다.
//!
//! ## 인증 흐름
//! 1. `POST /token/auth_refresh?refreshtoken=...` → `idToken` (24시간 유효)
//! 2. `GET /listed/info` (`Authorization: Bearer {idToken}`)

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::universe::UniverseProvider;
use crate::error::{DataError, Result};

/// J-Quants API 기본 URL.
pub const DEFAULT_BASE_URL: &str = "https://api.jquants.com/v1";

/// 프라임 시장 구분명.
const PRIME_MARKET: &str = "プライム";

/// ID 토큰 유효 시간.
const ID_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Deserialize)]
struct AuthRefreshResponse {
    #[serde(rename = "idToken")]
    id_token: String,
}

#[derive(Deserialize)]
struct ListedInfoResponse {
    #[serde(default)]
    info: Vec<ListedInfo>,
}

/// 상장 종목 정보 (필요한 필드만).
#[derive(Debug, Clone, Deserialize)]
pub struct ListedInfo {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "CompanyName", default)]
    pub company_name: Option<String>,
    #[serde(rename = "MarketCodeName", default)]
    pub market_code_name: Option<String>,
}

struct IdToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

/// J-Quants 종목 Provider.
pub struct JQuantsProvider {
    client: Client,
    base_url: String,
    refresh_token: Option<SecretString>,
    id_token: Mutex<Option<IdToken>>,
}

impl JQuantsProvider {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        refresh_token: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresh_token,
            id_token: Mutex::new(None),
        }
    }

    /// 유효한 ID 토큰을 반환합니다. 만료되었으면 재발급합니다.
    async fn id_token(&self) -> Result<String> {
        {
            let cached = self.id_token.lock().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Utc::now() {
                    return Ok(token.value.expose_secret().to_string());
                }
            }
        }

        let refresh_token = self.refresh_token.as_ref().ok_or_else(|| {
            DataError::AuthError("JQUANTS_REFRESH_TOKEN이 설정되지 않았습니다".to_string())
        })?;

        let response = self
            .client
            .post(format!("{}/token/auth_refresh", self.base_url))
            .query(&[("refreshtoken", refresh_token.expose_secret())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::AuthError(format!("ID 토큰 발급 실패: HTTP {}", status)));
        }

        let body: AuthRefreshResponse = serde_json::from_str(&response.text().await?)
            .map_err(|e| DataError::ParseError(format!("idToken 응답 파싱 실패: {}", e)))?;

        *self.id_token.lock().await = Some(IdToken {
            value: SecretString::from(body.id_token.clone()),
            expires_at: Utc::now() + Duration::hours(ID_TOKEN_TTL_HOURS),
        });
        tracing::debug!("J-Quants ID 토큰 발급 완료");

        Ok(body.id_token)
    }

    /// 전체 상장 종목 정보 조회.
    pub async fn listed_info(&self) -> Result<Vec<ListedInfo>> {
        let id_token = self.id_token().await?;

        let response = self
            .client
            .get(format!("{}/listed/info", self.base_url))
            .bearer_auth(id_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.id_token.lock().await.take();
                return Err(DataError::AuthError(format!(
                    "상장 종목 조회 거부: HTTP {}",
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(DataError::FetchError(format!("상장 종목 조회 실패: HTTP {}", status)));
            }
            _ => {}
        }

        let body: ListedInfoResponse = serde_json::from_str(&response.text().await?)
            .map_err(|e| DataError::ParseError(format!("listed/info 응답 파싱 실패: {}", e)))?;

        Ok(body.info)
    }
}

/// J-Quants 5자리 코드를 4자리 상장 코드로 변환합니다.
///
/// J-Quants는 보통주 코드 끝에 `0`을 붙여 5자리로 제공합니다 (`72030` → `7203`).
fn to_listing_code(code: &str) -> &str {
    let code = code.trim();
    if code.len() == 5 && code.ends_with('0') && code.bytes().all(|b| b.is_ascii_digit()) {
        &code[..4]
    } else {
        code
    }
}

#[async_trait]
impl UniverseProvider for JQuantsProvider {
    fn name(&self) -> &str {
        "jquants"
    }

    async fn fetch_universe(&self) -> Result<Vec<String>> {
        let info = self.listed_info().await?;
        let total = info.len();

        let codes: Vec<String> = info
            .iter()
            .filter(|item| item.market_code_name.as_deref() == Some(PRIME_MARKET))
            .map(|item| to_listing_code(&item.code).to_string())
            .collect();

        tracing::info!(total, prime = codes.len(), "J-Quants 프라임 종목 필터링");
        Ok(codes)
    }
}
