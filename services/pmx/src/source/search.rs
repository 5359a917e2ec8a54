use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::traits::{RecordQuery, RecordSource};
use crate::config::SourceConfig;
use crate::market::record::{RawRecord, SearchHit};

/// Fields requested from the index
pub const SOURCE_FIELDS: [&str; 11] = [
    "saleDate", "county", "area", "region", "rawAddress", "price",
    "beds", "id", "sqrMetres", "location", "marketType",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

/// Queries a search index over HTTP
pub struct SearchIndexSource {
    client: reqwest::Client,
    endpoint: Url,
    api_token: String,
}

impl SearchIndexSource {
    pub fn new(base_url: &str, index: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid search index URL: {}", base_url))?;
        let endpoint = base
            .join(index)
            .with_context(|| format!("Invalid index path: {}", index))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            api_token: api_token.to_string(),
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .context("source.url is required for the search source")?;
        Self::new(
            url,
            &config.index,
            &config.api_token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Bool query: match the market tag, range-filter the sale date
pub fn build_query_body(query: &RecordQuery) -> serde_json::Value {
    json!({
        "_source": { "include": SOURCE_FIELDS },
        "query": {
            "bool": {
                "must": [{ "match": { "marketType": query.market.tag() } }],
                "filter": [{
                    "range": {
                        "saleDate": {
                            "gte": query.from.format("%Y-%m-%d").to_string(),
                            "lte": query.to.format("%Y-%m-%d").to_string(),
                        }
                    }
                }]
            }
        }
    })
}

#[async_trait]
impl RecordSource for SearchIndexSource {
    fn name(&self) -> &str {
        "search"
    }

    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<RawRecord>> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("size", &query.max_size.to_string());

        tracing::debug!("Querying search index: {}", url);

        let mut request = self.client.post(url).json(&build_query_body(query));
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }

        let response = request.send().await.context("Search index request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Search index returned {}: {}", status, body);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Failed to parse search index response")?;
        let records: Vec<RawRecord> = parsed.hits.hits.into_iter().map(|h| h.source).collect();

        tracing::info!(
            "Fetched {} {} records from {} [{} .. {}]",
            records.len(),
            query.market,
            self.endpoint,
            query.from,
            query.to
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use crate::market::period::Period;
    use crate::market::record::MarketType;
    use chrono::NaiveDate;

    #[test]
    fn test_query_body() {
        let query = RecordQuery::new(
            MarketType::Rent,
            Period::new(
                NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            ),
            3000,
        );
        let body = build_query_body(&query);

        assert_eq!(
            body["query"]["bool"]["must"][0]["match"]["marketType"],
            "Residential Rent"
        );
        let range = &body["query"]["bool"]["filter"][0]["range"]["saleDate"];
        assert_eq!(range["gte"], "2021-02-01");
        assert_eq!(range["lte"], "2024-01-31");
        assert_eq!(body["_source"]["include"].as_array().unwrap().len(), 11);
    }

    #[test]
    fn test_endpoint_join() {
        let source = SearchIndexSource::new(
            "https://index.example:9200",
            "_search",
            "",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(source.endpoint().as_str(), "https://index.example:9200/_search");
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = SourceConfig {
            kind: SourceKind::Search,
            path: String::new(),
            url: None,
            index: "_search".to_string(),
            api_token: String::new(),
            max_size: 10,
            timeout_secs: 5,
        };
        assert!(SearchIndexSource::from_config(&config).is_err());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"hits":{"total":2,"hits":[
            {"_id":"a","_source":{"county":"Cork","beds":3,"price":250000}},
            {"_id":"b","_source":{"county":"Mayo","beds":"2","price":"150000"}}
        ]}}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.hits.hits.len(), 2);
        assert_eq!(parsed.hits.hits[1].source.county.as_deref(), Some("Mayo"));
    }
}
