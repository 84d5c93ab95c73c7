use crate::error::SourceError;
use crate::models::{Listing, Provider};
use crate::sources::traits::SourceAdapter;
use crate::sources::types::SourceConfig;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const PROVIDER: &str = "SAGA";

/// SAGA Hamburg adapter. Scrapes the public offer search page and, per
/// offer, resolves the Immomio application link from the detail page.
pub struct SagaAdapter {
    client: Client,
    config: SourceConfig,
}

struct TeaserSelectors {
    results: Selector,
    teaser: Selector,
    headline: Selector,
    subline: Selector,
    data_item: Selector,
}

impl TeaserSelectors {
    fn new() -> Self {
        // Selectors are compile-time constants; parse cannot fail.
        Self {
            results: Selector::parse("div.immo-search-results").unwrap(),
            teaser: Selector::parse("div.teaser3").unwrap(),
            headline: Selector::parse("h3.teaser3__headline a").unwrap(),
            subline: Selector::parse("p.teaser3__subline").unwrap(),
            data_item: Selector::parse("ul.teaser3__data li").unwrap(),
        }
    }
}

impl SagaAdapter {
    pub fn new(config: SourceConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()?;

        Ok(Self { client, config })
    }

    /// Parse offer teasers from the search page. Malformed teasers are
    /// skipped; duplicate links within one page are dropped so a batch
    /// never carries the same identity twice.
    fn parse_listings(&self, html: &str) -> Result<Vec<Listing>, SourceError> {
        let document = Html::parse_document(html);
        let selectors = TeaserSelectors::new();

        let teasers: Vec<_> = document.select(&selectors.teaser).collect();
        if teasers.is_empty() && document.select(&selectors.results).next().is_none() {
            // No teasers and no results container at all: the page layout
            // changed or we got an error page.
            return Err(SourceError::Parse {
                provider: PROVIDER,
                reason: "offer search markup not found".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut listings = Vec::new();

        for teaser in teasers {
            let Some(listing) = self.parse_teaser(&teaser, &selectors) else {
                debug!(provider = PROVIDER, "Skipping malformed offer teaser");
                continue;
            };
            if seen.insert(listing.link.clone()) {
                listings.push(listing);
            } else {
                debug!(provider = PROVIDER, link = %listing.link, "Duplicate offer on page");
            }
        }

        Ok(listings)
    }

    fn parse_teaser(
        &self,
        teaser: &scraper::ElementRef<'_>,
        selectors: &TeaserSelectors,
    ) -> Option<Listing> {
        let headline = teaser.select(&selectors.headline).next()?;
        let href = headline.value().attr("href")?;
        let title = collapse_text(&headline.text().collect::<String>());
        if title.is_empty() {
            return None;
        }

        let street = teaser
            .select(&selectors.subline)
            .next()
            .map(|el| collapse_text(&el.text().collect::<String>()))
            .unwrap_or_default();

        let mut rooms = None;
        let mut area_sqm = None;
        let mut rent = None;

        for item in teaser.select(&selectors.data_item) {
            let text = collapse_text(&item.text().collect::<String>());
            if text.contains("Zimmer") {
                rooms = parse_german_decimal(&text);
            } else if text.contains("m²") {
                area_sqm = parse_german_decimal(&text);
            } else if text.contains('€') {
                rent = parse_german_decimal(&text);
            }
        }

        let link = format!("{}{}", self.config.base_url, href);

        Some(Listing {
            external_link: link.clone(),
            link,
            title,
            street,
            rooms: rooms?,
            area_sqm: area_sqm?,
            rent: rent?,
            internal_link: href.to_string(),
            provider: Provider::Saga,
            fetched_at: Utc::now(),
            is_new: false,
            index: 0,
        })
    }

    /// Fetch the offer's detail page and pull out the Immomio application
    /// link. Best effort: on any trouble the detail URL stays in place.
    async fn resolve_application_link(&self, detail_url: &str) -> Option<String> {
        let response = self.client.get(detail_url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let html = response.text().await.ok()?;

        let document = Html::parse_document(&html);
        let selector = Selector::parse(r#"a[href*="immomio"]"#).unwrap();
        document
            .select(&selector)
            .find_map(|el| el.value().attr("href").map(str::to_string))
    }
}

#[async_trait]
impl SourceAdapter for SagaAdapter {
    async fn fetch(&self) -> Result<Vec<Listing>, SourceError> {
        let url = format!("{}{}", self.config.base_url, self.config.search_path);
        debug!(provider = PROVIDER, %url, "Fetching offer search page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Fetch {
                provider: PROVIDER,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SourceError::Fetch {
                provider: PROVIDER,
                reason: format!("status {}", response.status()),
            });
        }

        let html = response.text().await.map_err(|e| SourceError::Fetch {
            provider: PROVIDER,
            reason: e.to_string(),
        })?;

        let mut listings = self.parse_listings(&html)?;

        // Resolve application links concurrently across all offers.
        let resolved = join_all(
            listings
                .iter()
                .map(|listing| self.resolve_application_link(&listing.link)),
        )
        .await;

        for (listing, application_link) in listings.iter_mut().zip(resolved) {
            match application_link {
                Some(link) => listing.external_link = link,
                None => warn!(
                    provider = PROVIDER,
                    link = %listing.link,
                    "No Immomio link on detail page, keeping detail URL"
                ),
            }
        }

        info!(provider = PROVIDER, count = listings.len(), "Fetched offers");
        Ok(listings)
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }
}

/// Collapse runs of whitespace into single spaces and trim.
fn collapse_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the first number in a German-formatted snippet such as
/// "54,11 m²", "1.024,50 €" or "2 Zimmer".
fn parse_german_decimal(text: &str) -> Option<f32> {
    let raw: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == ' ')
        .filter(|c| !c.is_whitespace())
        .collect();
    if raw.is_empty() {
        return None;
    }
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw
    };
    normalized.parse().ok()
}
