use std::time::Duration;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::raw::CardListResponse;
use crate::settings::Settings;

const SITE_ORIGIN: &str = "https://starwarsunlimited.com";
const SITE_REFERER: &str = "https://starwarsunlimited.com/";
const SORT_ORDER: &str = "type.sortValue:asc,expansion.sortValue:desc,cardNumber:asc";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for page {page} failed: {source}")]
    Http {
        page: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("page {page} returned HTTP {status}")]
    Status {
        page: u32,
        status: reqwest::StatusCode,
    },
    #[error("page {page} is not a valid card listing: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
}

/// Anything that can serve numbered pages of the card listing.
pub trait CardSource {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<CardListResponse, FetchError>;
}

/// HTTP client for the public card-list endpoint.
pub struct ApiClient {
    client: reqwest::Client,
    endpoint: String,
    locale: String,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, HeaderValue::from_static(SITE_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static(SITE_REFERER));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/card-list", settings.api_base.trim_end_matches('/')),
            locale: settings.locale.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CardSource for ApiClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<CardListResponse, FetchError> {
        debug!("GET {} page={} page_size={}", self.endpoint, page, page_size);
        let query = [
            ("locale", self.locale.clone()),
            ("orderBy[expansion][id]", "asc".to_string()),
            ("sort[0]", SORT_ORDER.to_string()),
            ("filters[variantOf][id][$null]", "true".to_string()),
            ("pagination[page]", page.to_string()),
            ("pagination[pageSize]", page_size.to_string()),
            ("populate", "*".to_string()),
        ];

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|source| FetchError::Http { page, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { page, status });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Http { page, source })?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode { page, source })
    }
}

/// Walk every page of the listing in order and return all records.
///
/// The page count comes from the first page. A first page without it is
/// treated as the only page. Any failed request aborts the whole fetch.
pub async fn fetch_all<S: CardSource>(
    source: &S,
    page_size: u32,
) -> Result<Vec<serde_json::Value>> {
    let first = source.fetch_page(1, page_size).await?;

    let total_pages = match first.pagination().and_then(|p| Some((p, p.page_count?))) {
        Some((p, count)) => {
            info!(
                "Found {} cards across {} pages of {}",
                p.total.unwrap_or_default(),
                count,
                p.page_size.unwrap_or(page_size)
            );
            count.max(1)
        }
        None => {
            warn!("First page carries no page count, treating it as the only page");
            1
        }
    };

    let mut records = first.into_records();
    info!("Fetched page 1/{} ({} cards)", total_pages, records.len());

    for page in 2..=total_pages {
        let response = source.fetch_page(page, page_size).await?;
        if let Some(served) = response.pagination().and_then(|p| p.page) {
            if served != page {
                warn!("Asked for page {} but was served page {}", page, served);
            }
        }
        let cards = response.into_records();
        info!("Fetched page {}/{} ({} cards)", page, total_pages, cards.len());
        records.extend(cards);
    }

    info!("Fetched {} cards", records.len());
    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Serves canned JSON pages and records which pages were asked for.
    pub(crate) struct FakeSource {
        pub pages: Vec<serde_json::Value>,
        pub fail_on: Option<u32>,
        pub requests: RefCell<Vec<u32>>,
    }

    impl FakeSource {
        pub fn new(pages: Vec<serde_json::Value>) -> Self {
            Self {
                pages,
                fail_on: None,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl CardSource for FakeSource {
        async fn fetch_page(
            &self,
            page: u32,
            _page_size: u32,
        ) -> Result<CardListResponse, FetchError> {
            self.requests.borrow_mut().push(page);
            if self.fail_on == Some(page) {
                return Err(FetchError::Status {
                    page,
                    status: reqwest::StatusCode::BAD_GATEWAY,
                });
            }
            let body = self.pages[(page - 1) as usize].to_string();
            serde_json::from_str(&body).map_err(|source| FetchError::Decode { page, source })
        }
    }

    fn page(ids: &[i64], page_count: Option<u32>) -> serde_json::Value {
        let data: Vec<_> = ids
            .iter()
            .map(|id| serde_json::json!({ "id": id, "attributes": { "title": format!("Card {}", id) } }))
            .collect();
        match page_count {
            Some(n) => serde_json::json!({
                "data": data,
                "meta": { "pagination": { "pageSize": 2, "pageCount": n, "total": n * 2 } }
            }),
            None => serde_json::json!({ "data": data }),
        }
    }

    fn ids(records: &[serde_json::Value]) -> Vec<i64> {
        records.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[tokio::test]
    async fn walks_every_page_in_order() {
        let source = FakeSource::new(vec![
            page(&[1, 2], Some(3)),
            page(&[3, 4], Some(3)),
            page(&[5], Some(3)),
        ]);
        let records = fetch_all(&source, 2).await.unwrap();
        assert_eq!(*source.requests.borrow(), vec![1, 2, 3]);
        assert_eq!(ids(&records), (1..=5).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn missing_page_count_means_single_page() {
        let source = FakeSource::new(vec![page(&[1, 2], None), page(&[3], None)]);
        let records = fetch_all(&source, 2).await.unwrap();
        assert_eq!(*source.requests.borrow(), vec![1]);
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn zero_page_count_means_single_page() {
        let source = FakeSource::new(vec![page(&[], Some(0))]);
        let records = fetch_all(&source, 40).await.unwrap();
        assert_eq!(*source.requests.borrow(), vec![1]);
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn failed_page_aborts_fetch() {
        let mut source = FakeSource::new(vec![
            page(&[1], Some(3)),
            page(&[2], Some(3)),
            page(&[3], Some(3)),
        ]);
        source.fail_on = Some(2);
        let err = fetch_all(&source, 1).await.unwrap_err();
        assert!(err.to_string().contains("page 2"));
        assert_eq!(*source.requests.borrow(), vec![1, 2]);
    }

    #[test]
    fn client_endpoint_from_settings() {
        let settings = Settings {
            api_base: "https://admin.example.com/api/".into(),
            ..Settings::default()
        };
        let client = ApiClient::new(&settings).unwrap();
        assert_eq!(client.endpoint(), "https://admin.example.com/api/card-list");
    }
}
