/// Public purchase tracking page; the purchase id is appended as `?compra=<id>`.
pub const TRACKING_BASE_URL: &str =
    "https://cnetmobile.estaleiro.serpro.gov.br/comprasnet-web/public/compras/acompanhamento-compra";

/// Price research endpoint for catalog materials.
pub const MATERIAL_ENDPOINT: &str = "/modulo-pesquisa-preco/1_consultarMaterial";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base: String,
    pub page_size: u32,
    pub http_timeout_secs: u64,
    pub fetch_retries: u32,
    pub fetch_retry_base_ms: u64,
    /// Number of (item, location) pairs fetched at once. 1 keeps the
    /// upstream calls strictly sequential.
    pub fetch_concurrency: usize,
    pub cache_ttl_secs: u64,
    /// Hard stop for runaway `totalPaginas` values.
    pub max_pages: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://dadosabertos.compras.gov.br".to_string(),
            page_size: 500,
            http_timeout_secs: 30,
            fetch_retries: 2,
            fetch_retry_base_ms: 250,
            fetch_concurrency: 1,
            cache_ttl_secs: 3600,
            max_pages: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_base: std::env::var("COMPRAS_API_BASE").unwrap_or(d.api_base),
            page_size: std::env::var("PAGE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(d.page_size),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.http_timeout_secs),
            fetch_retries: std::env::var("FETCH_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(d.fetch_retries),
            fetch_retry_base_ms: std::env::var("FETCH_RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.fetch_retry_base_ms),
            fetch_concurrency: std::env::var("FETCH_CONCURRENCY").ok().and_then(|v| v.parse().ok()).unwrap_or(d.fetch_concurrency).max(1),
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.cache_ttl_secs),
            max_pages: std::env::var("MAX_PAGES").ok().and_then(|v| v.parse().ok()).unwrap_or(d.max_pages),
        }
    }

    pub fn material_url(&self) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), MATERIAL_ENDPOINT)
    }
}

pub fn tracking_link(purchase_id: &str) -> String {
    format!("{}?compra={}", TRACKING_BASE_URL, purchase_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_url_ignores_trailing_slash() {
        let cfg = Config {
            api_base: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            cfg.material_url(),
            "http://localhost:8080/modulo-pesquisa-preco/1_consultarMaterial"
        );
    }

    #[test]
    fn tracking_link_appends_purchase_id() {
        let link = tracking_link("15013405900312023");
        assert!(link.ends_with("acompanhamento-compra?compra=15013405900312023"));
    }
}
