//! Environment-sourced configuration. Credentials and endpoints for the
//! LLM, compound registry, patent database, and optional web fetcher are
//! opaque to the core (spec §6 "Environment configuration") — this struct
//! is the one place that reads them.
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub registry_base_url: String,
    pub name_resolver_fallback_url: String,
    pub patent_db_base_url: Option<String>,
    pub paper_search_base_url: Option<String>,
    pub connect_timeout: Duration,
    pub download_read_timeout: Duration,
    pub paper_search_timeout: Duration,
    pub max_concurrent_downloads: usize,
    pub extraction_batch_size: usize,
    pub max_expansion_iterations: u32,
}

impl Config {
    /// Loads a `.env` file if present (silently skipped otherwise) and
    /// then reads configuration from the process environment, applying
    /// defaults for anything optional.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            llm_api_key: env::var("API_KEY").ok(),
            llm_base_url: env::var("BASE_URL").ok(),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            llm_temperature: env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            registry_base_url: env::var("COMPOUND_REGISTRY_URL")
                .unwrap_or_else(|_| "https://pubchem.ncbi.nlm.nih.gov/rest/pug".to_string()),
            name_resolver_fallback_url: env::var("NAME_RESOLVER_FALLBACK_URL")
                .unwrap_or_else(|_| "https://pubchem.ncbi.nlm.nih.gov/rest/pug".to_string()),
            patent_db_base_url: env::var("PATENT_DB_URL").ok(),
            paper_search_base_url: env::var("PAPER_SEARCH_URL").ok(),
            connect_timeout: Duration::from_secs(10),
            download_read_timeout: Duration::from_secs(30),
            paper_search_timeout: Duration::from_secs(60),
            max_concurrent_downloads: env::var("MAX_CONCURRENT_DOWNLOADS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            extraction_batch_size: env::var("EXTRACTION_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            max_expansion_iterations: env::var("MAX_EXPANSION_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // SAFETY: test runs single-threaded w.r.t. this var; no other test touches it.
        unsafe {
            std::env::remove_var("MAX_CONCURRENT_DOWNLOADS");
            std::env::remove_var("EXTRACTION_BATCH_SIZE");
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.max_concurrent_downloads, 3);
        assert_eq!(cfg.extraction_batch_size, 2);
        assert_eq!(cfg.llm_model, "gpt-4o".to_string());
    }
}
