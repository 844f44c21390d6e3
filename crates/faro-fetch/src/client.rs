//! FMP API client implementation.

use std::{env, future::Future, time::Duration};

use reqwest::Client;
use tracing::{debug, warn};

use crate::{
    Result,
    error::FetchError,
    types::{
        AdjustedPrice, Dividend, EnterpriseValue, EntitySnapshot, Period, RawStatement, SharesPoint,
    },
};

/// Base URL for the FMP stable API.
const FMP_BASE_URL: &str = "https://financialmodelingprep.com/stable";

/// Run `op`; after a transient failure, wait `backoff` and run it once more.
///
/// The second outcome is returned as is.
pub async fn retry_once<T, F, Fut>(backoff: Duration, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(e) if e.is_transient() => {
            warn!(request = what, error = %e, backoff_secs = backoff.as_secs(), "Request failed, retrying once");
            tokio::time::sleep(backoff).await;
            op().await
        }
        outcome => outcome,
    }
}

/// A source of per-entity snapshots.
pub trait SnapshotSource: Send + Sync {
    /// Fetch one entity. Indices only need prices and dividends.
    fn snapshot(
        &self,
        symbol: &str,
        fundamentals: bool,
    ) -> impl Future<Output = Result<EntitySnapshot>> + Send;
}

/// Financial Modeling Prep API client.
#[derive(Debug, Clone)]
pub struct FmpClient {
    client: Client,
    api_key: String,
    backoff: Duration,
    from: Option<String>,
    periods: u32,
}

impl FmpClient {
    /// Create a new FMP client with the given API key.
    ///
    /// Defaults: 300 s retry backoff, full price history, 10 annual periods.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            backoff: Duration::from_secs(300),
            from: None,
            periods: 10,
        }
    }

    /// Create a new FMP client from the `FMP_API_KEY` environment variable.
    ///
    /// Loading a `.env` file is left to the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment variable is not set.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("FMP_API_KEY").map_err(|_| FetchError::MissingApiKey)?;

        Ok(Self::new(api_key))
    }

    /// Wait this long before the single retry.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetch prices from this date (`YYYY-MM-DD`) on.
    #[must_use]
    pub fn with_history_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Number of annual statements to request.
    #[must_use]
    pub const fn with_periods(mut self, periods: u32) -> Self {
        self.periods = periods;
        self
    }

    /// Build a URL with the API key.
    fn url(&self, endpoint: &str) -> String {
        if endpoint.contains('?') {
            format!("{FMP_BASE_URL}/{endpoint}&apikey={}", self.api_key)
        } else {
            format!("{FMP_BASE_URL}/{endpoint}?apikey={}", self.api_key)
        }
    }

    /// Make a GET request and parse the JSON response.
    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(endpoint);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::Api(format!("HTTP {status}: {text}")));
        }

        let text = response.text().await?;

        // Check for error responses
        if text.contains("\"Error Message\"") {
            return Err(FetchError::Api(text));
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// GET with the single retry.
    async fn get_retrying<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        retry_once(self.backoff, endpoint, || self.get(endpoint)).await
    }

    fn statement_endpoint(&self, kind: &str, symbol: &str, period: Period) -> String {
        format!(
            "{kind}?symbol={}&period={}&limit={}",
            symbol.to_uppercase(),
            period.as_str(),
            self.periods
        )
    }

    /// Daily dividend-adjusted closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails twice.
    pub async fn adjusted_prices(&self, symbol: &str) -> Result<Vec<AdjustedPrice>> {
        let from = self.from.as_ref().map(|f| format!("&from={f}")).unwrap_or_default();
        let endpoint = format!(
            "historical-price-eod/dividend-adjusted?symbol={}{from}",
            symbol.to_uppercase()
        );
        self.get_retrying(&endpoint).await
    }

    /// Dividend history.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails twice.
    pub async fn dividends(&self, symbol: &str) -> Result<Vec<Dividend>> {
        let endpoint = format!("dividends?symbol={}", symbol.to_uppercase());
        self.get_retrying(&endpoint).await
    }

    /// Income statements.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails twice.
    pub async fn income_statement(&self, symbol: &str, period: Period) -> Result<Vec<RawStatement>> {
        let endpoint = self.statement_endpoint("income-statement", symbol, period);
        self.get_retrying(&endpoint).await
    }

    /// Balance sheets.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails twice.
    pub async fn balance_sheet(&self, symbol: &str, period: Period) -> Result<Vec<RawStatement>> {
        let endpoint = self.statement_endpoint("balance-sheet-statement", symbol, period);
        self.get_retrying(&endpoint).await
    }

    /// Cash flow statements.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails twice.
    pub async fn cash_flow(&self, symbol: &str, period: Period) -> Result<Vec<RawStatement>> {
        let endpoint = self.statement_endpoint("cash-flow-statement", symbol, period);
        self.get_retrying(&endpoint).await
    }

    /// Enterprise values, used for share counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails twice.
    pub async fn enterprise_values(&self, symbol: &str, period: Period) -> Result<Vec<EnterpriseValue>> {
        let endpoint = self.statement_endpoint("enterprise-values", symbol, period);
        self.get_retrying(&endpoint).await
    }
}

impl SnapshotSource for FmpClient {
    async fn snapshot(&self, symbol: &str, fundamentals: bool) -> Result<EntitySnapshot> {
        let prices = self.adjusted_prices(symbol).await?;
        let dividends = self.dividends(symbol).await?;
        let mut snapshot = EntitySnapshot {
            symbol: symbol.to_string(),
            prices,
            dividends,
            ..EntitySnapshot::default()
        };
        if !fundamentals {
            return Ok(snapshot);
        }

        snapshot.income = self.income_statement(symbol, Period::Annual).await?;
        snapshot.balance = self.balance_sheet(symbol, Period::Annual).await?;
        snapshot.cashflow = self.cash_flow(symbol, Period::Annual).await?;
        snapshot.shares = self
            .enterprise_values(symbol, Period::Annual)
            .await?
            .into_iter()
            .map(|ev| SharesPoint {
                date: ev.date,
                ordinary: ev.number_of_shares,
                preferred: None,
            })
            .collect();
        debug!(
            symbol,
            prices = snapshot.prices.len(),
            statements = snapshot.income.len(),
            "Fetched snapshot"
        );
        Ok(snapshot)
    }
}
