use chrono::{DateTime, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{ChatDataClient, PageDecode};
use crate::error::ChatDataError;

pub const PAGE_SIZE: u64 = 100;

/// Offset-paginated listings a chatbot exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Leads,
    Conversations,
}

impl Collection {
    pub fn path(&self, chatbot_id: &str) -> String {
        match self {
            Collection::Leads => format!("/get-customers/{chatbot_id}"),
            Collection::Conversations => format!("/get-conversations/{chatbot_id}"),
        }
    }

    /// Array field carrying the records of one page.
    pub fn field(&self) -> &'static str {
        match self {
            Collection::Leads => "customers",
            Collection::Conversations => "conversations",
        }
    }
}

/// Where a lead or conversation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Source {
    /// No filter
    #[default]
    #[serde(rename = "")]
    All,
    #[serde(rename = "api")]
    Api,
    #[serde(rename = "site")]
    Site,
    Discord,
    #[serde(rename = "iframe")]
    Iframe,
    Messenger,
    Slack,
    Whatsapp,
    #[serde(rename = "widget")]
    Widget,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::All => "",
            Source::Api => "api",
            Source::Site => "site",
            Source::Discord => "Discord",
            Source::Iframe => "iframe",
            Source::Messenger => "Messenger",
            Source::Slack => "Slack",
            Source::Whatsapp => "Whatsapp",
            Source::Widget => "widget",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFilters {
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
    pub source: Option<Source>,
    pub lead_id: Option<String>,
}

impl PageFilters {
    /// Build filters from user-facing dates. Blank values are unset.
    pub fn from_dates(
        start_date: Option<&str>,
        end_date: Option<&str>,
        source: Option<Source>,
        lead_id: Option<&str>,
    ) -> Result<Self, ChatDataError> {
        fn present(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }
        Ok(Self {
            start_timestamp: present(start_date).map(epoch_millis).transpose()?,
            end_timestamp: present(end_date).map(epoch_millis).transpose()?,
            source: source.filter(|s| *s != Source::All),
            lead_id: present(lead_id).map(str::to_string),
        })
    }
}

/// ISO-8601 date or datetime to epoch milliseconds. Values without an
/// offset are read as UTC.
pub fn epoch_millis(value: &str) -> Result<String, ChatDataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp_millis().to_string());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc().timestamp_millis().to_string());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis().to_string())
        .ok_or_else(|| ChatDataError::Validation(format!("Invalid date: {value}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub resource_id: String,
    pub page_size: u64,
    /// Always a multiple of `page_size`.
    pub offset: u64,
    pub filters: PageFilters,
}

impl PageRequest {
    pub fn first(resource_id: &str, filters: PageFilters) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            page_size: PAGE_SIZE,
            offset: 0,
            filters,
        }
    }

    pub fn page_number(&self) -> u64 {
        self.offset / self.page_size
    }

    pub fn next(&self) -> Self {
        Self { offset: self.offset + self.page_size, ..self.clone() }
    }

    /// Query string in send order; `start` is left out on the first page.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("size", self.page_size.to_string())];
        if self.offset > 0 {
            pairs.push(("start", self.offset.to_string()));
        }
        if let Some(ts) = &self.filters.start_timestamp {
            pairs.push(("startTimestamp", ts.clone()));
        }
        if let Some(ts) = &self.filters.end_timestamp {
            pairs.push(("endTimestamp", ts.clone()));
        }
        if let Some(source) = self.filters.source {
            pairs.push(("source", source.as_str().to_string()));
        }
        if let Some(lead_id) = &self.filters.lead_id {
            pairs.push(("leadId", lead_id.clone()));
        }
        pairs
    }
}

pub struct PaginatedCollector<'a> {
    client: &'a ChatDataClient,
}

impl<'a> PaginatedCollector<'a> {
    pub fn new(client: &'a ChatDataClient) -> Self {
        Self { client }
    }

    /// Fetch pages in order until the listing is drained or `limit`
    /// records were gathered (`limit == 0` means no limit).
    pub async fn collect(
        &self,
        collection: Collection,
        chatbot_id: &str,
        filters: PageFilters,
        limit: usize,
    ) -> Result<Vec<Value>, ChatDataError> {
        let mut page = PageRequest::first(chatbot_id, filters);
        let mut records: Vec<Value> = Vec::new();

        loop {
            let (batch, total) = match self.client.fetch_page(collection, &page).await? {
                PageDecode::Page { records, total } => (records, total),
                // TODO: a missing array on a later page may hide an API change;
                // surface it once the API documents the shape.
                PageDecode::Exhausted => break,
            };
            debug!(
                field = collection.field(),
                page = page.page_number(),
                received = batch.len(),
                total,
                "page fetched"
            );
            records.extend(batch);

            let has_more = total > (page.page_number() + 1) * page.page_size;
            if limit > 0 && records.len() >= limit {
                records.truncate(limit);
                break;
            }
            if !has_more {
                break;
            }
            page = page.next();
        }

        info!(
            "✅ collected {} {} for chatbot {}",
            records.len(),
            collection.field(),
            chatbot_id
        );
        Ok(records)
    }
}
