use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::retry::{is_retryable_http_error, is_retryable_network_error, retry_async_when, RetryConfig};
use super::{location_label, PairRows, RecordSource};
use crate::config::Config;
use crate::location::StateCode;
use crate::logging::log_fetch_page;
use crate::record::RawRecord;

/// One page of `1_consultarMaterial`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub resultado: Vec<RawRecord>,
    #[serde(default)]
    pub total_paginas: u32,
    #[serde(default)]
    pub total_registros: Option<u64>,
}

#[derive(Debug, Error)]
#[error("HTTP {status}: {body}")]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(status) = err.downcast_ref::<HttpStatusError>() {
        return is_retryable_http_error(status.status);
    }
    if let Some(net) = err.downcast_ref::<reqwest::Error>() {
        return is_retryable_network_error(net);
    }
    false
}

/// Walks pages 1..=totalPaginas (as reported by page 1, capped at
/// `max_pages`) and drops rows already seen on an earlier page. The
/// result records how many pages upstream reported, so a capped walk is
/// visible to the caller.
pub async fn collect_pages<F, Fut>(
    item: u64,
    state: Option<StateCode>,
    max_pages: u32,
    mut fetch_page: F,
) -> Result<PairRows>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page>>,
{
    let location = location_label(state);
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut page_no = 1;
    let mut total_pages = 1;
    let mut reported = 1;

    while page_no <= total_pages {
        let page = fetch_page(page_no).await?;
        if page_no == 1 {
            reported = page.total_paginas.max(1);
            total_pages = page.total_paginas.min(max_pages);
        }
        log_fetch_page(item, &location, page_no, total_pages, page.resultado.len());
        for row in page.resultado {
            if seen.insert(row.fingerprint()) {
                rows.push(row);
            }
        }
        page_no += 1;
    }
    Ok(PairRows {
        rows,
        pages_loaded: page_no - 1,
        pages_reported: reported,
    })
}

/// HTTP client for the federal price research API.
pub struct ComprasClient {
    client: Client,
    cfg: Config,
    retry: RetryConfig,
}

impl ComprasClient {
    pub fn new(cfg: Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            retry: RetryConfig::from_config(&cfg),
            cfg,
        })
    }

    pub fn page_url(&self, item: u64, state: Option<StateCode>, page: u32) -> Result<Url> {
        let mut url = Url::parse(&self.cfg.material_url())?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("codigoItemCatalogo", &item.to_string());
            if let Some(state) = state {
                q.append_pair("estado", state.as_str());
            }
            q.append_pair("pagina", &page.to_string());
            q.append_pair("tamanhoPagina", &self.cfg.page_size.to_string());
        }
        Ok(url)
    }

    async fn fetch_page(&self, item: u64, state: Option<StateCode>, page: u32) -> Result<Page> {
        let url = self.page_url(item, state, page)?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HttpStatusError {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(resp.json::<Page>().await?)
    }
}

#[async_trait]
impl RecordSource for ComprasClient {
    async fn fetch_pair(&self, item: u64, state: Option<StateCode>) -> Result<PairRows> {
        collect_pages(item, state, self.cfg.max_pages, |page| {
            retry_async_when(&self.retry, "consultarMaterial", is_retryable, move || {
                self.fetch_page(item, state, page)
            })
        })
        .await
    }
}
