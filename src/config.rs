use crate::error::ConfigError;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

pub const MIN_BREADTH: usize = 2;
pub const MAX_BREADTH: usize = 10;
pub const MIN_DEPTH: usize = 1;
pub const MAX_DEPTH: usize = 5;

/// Token budget for one search document inside the extraction prompt.
pub const DOCUMENT_TOKEN_BUDGET: usize = 25_000;
/// Token budget for the concatenated learnings handed to the report writer.
pub const REPORT_TOKEN_BUDGET: usize = 150_000;
pub const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);
pub const LEARNINGS_PER_QUERY: usize = 3;
pub const FOLLOW_UPS_PER_QUERY: usize = 3;
/// Default number of in-flight branch pipelines across a whole research tree.
pub const DEFAULT_CONCURRENCY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    Tavily,
    Firecrawl,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub search_provider: SearchProvider,
    pub search_api_key: String,
    pub concurrency: usize,
    pub bind_addr: SocketAddr,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai_api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        if !openai_api_key.starts_with("sk-") {
            return Err(ConfigError::Invalid {
                key: "OPENAI_API_KEY",
                reason: "expected a key starting with 'sk-'".to_string(),
            });
        }

        let search_provider = match get("SEARCH_PROVIDER").as_deref() {
            None | Some("tavily") => SearchProvider::Tavily,
            Some("firecrawl") => SearchProvider::Firecrawl,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SEARCH_PROVIDER",
                    reason: format!("unknown provider '{other}'"),
                })
            }
        };
        let search_api_key = match search_provider {
            SearchProvider::Tavily => {
                get("TAVILY_API_KEY").ok_or(ConfigError::Missing("TAVILY_API_KEY"))?
            }
            SearchProvider::Firecrawl => {
                get("FIRECRAWL_API_KEY").ok_or(ConfigError::Missing("FIRECRAWL_API_KEY"))?
            }
        };

        let concurrency = match get("RESEARCH_CONCURRENCY") {
            None => DEFAULT_CONCURRENCY,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "RESEARCH_CONCURRENCY",
                        reason: format!("expected a positive integer, got '{raw}'"),
                    })
                }
            },
        };

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        Ok(Self {
            openai_api_key,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_base_url: get("OPENAI_BASE_URL"),
            search_provider,
            search_api_key,
            concurrency,
            bind_addr,
        })
    }
}

/// Checks the caller-facing bounds of a top-level research run.
pub fn validate_run_bounds(breadth: usize, depth: usize) -> Result<(), String> {
    if !(MIN_BREADTH..=MAX_BREADTH).contains(&breadth) {
        return Err(format!(
            "breadth must be between {MIN_BREADTH} and {MAX_BREADTH}, got {breadth}"
        ));
    }
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        return Err(format!(
            "depth must be between {MIN_DEPTH} and {MAX_DEPTH}, got {depth}"
        ));
    }
    Ok(())
}
