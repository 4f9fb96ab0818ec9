use crate::execution::rest_client::{RestClient, RestRequest};
use crate::execution::retry::RetryPolicy;
use crate::feeds::universe::SectorMap;
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use regex::Regex;
use std::path::Path;
use tracing::{info, warn};

pub const NIFTY_INDICES: &str = "https://www.niftyindices.com";
const EQUITY_INDEX_PAGE: &str = "/indices/equity/";

/// Rebuilds `SectorMap.json` from the niftyindices.com index pages.
///
/// The equity landing page lists every index in its tab menu; each index
/// page links to a constituent CSV under `/IndexConstituent/`.
pub struct SectorMapScraper {
    client: RestClient,
    base: url::Url,
    retry: RetryPolicy,
    concurrency: usize,
    menu: Regex,
    anchor: Regex,
    constituent: Regex,
    tags: Regex,
}

impl SectorMapScraper {
    pub fn new(client: RestClient, concurrency: usize) -> Result<Self> {
        Self::with_base(client, NIFTY_INDICES, concurrency)
    }

    pub fn with_base(client: RestClient, base: &str, concurrency: usize) -> Result<Self> {
        Ok(Self {
            client,
            base: url::Url::parse(base).with_context(|| format!("Bad base url {base}"))?,
            retry: RetryPolicy::scrape(),
            concurrency: concurrency.max(1),
            menu: Regex::new(r#"(?s)class="[^"]*\btabinsaidmenu\b[^"]*"(.*?)</ul>"#)?,
            anchor: Regex::new(r#"(?s)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)?,
            constituent: Regex::new(r#"href\s*=\s*["']([^"']*/IndexConstituent/[^"']+)["']"#)?,
            tags: Regex::new(r"<[^>]*>")?,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// (index name, absolute page url) from the tab menu of the landing page.
    pub fn index_pages(&self, html: &str) -> Vec<(String, String)> {
        self.menu
            .captures_iter(html)
            .flat_map(|menu| {
                let block = menu.get(1).map_or("", |m| m.as_str());
                self.anchor
                    .captures_iter(block)
                    .filter_map(|a| {
                        let href = a.get(1)?.as_str();
                        let name = html_text(&self.tags.replace_all(a.get(2)?.as_str(), ""));
                        let page = self.base.join(href).ok()?;
                        (!name.is_empty()).then(|| (name, page.to_string()))
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// File name of the last constituent CSV linked from an index page.
    pub fn constituent_file(&self, html: &str) -> Option<String> {
        self.constituent
            .captures_iter(html)
            .filter_map(|c| {
                let href = c.get(1)?.as_str();
                let file = href.rsplit('/').next()?.split(['?', '#']).next()?;
                (!file.is_empty()).then(|| file.to_string())
            })
            .last()
    }

    async fn page(&self, url: &str) -> Result<String> {
        let req = RestRequest::get(url);
        let text = self
            .retry
            .run(url, || self.client.send_text(&req))
            .await?;
        Ok(text)
    }

    pub async fn scrape(&self) -> Result<SectorMap> {
        let landing = self.base.join(EQUITY_INDEX_PAGE)?;
        let html = self.page(landing.as_str()).await?;
        let pages = self.index_pages(&html);
        anyhow::ensure!(!pages.is_empty(), "No index links found on {landing}");
        info!(indices = pages.len(), "Fetching index pages");

        let results: Vec<(String, Result<Option<String>>)> = stream::iter(pages)
            .map(|(name, url)| async move {
                let file = self.page(&url).await.map(|page| self.constituent_file(&page));
                (name, file)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut map = SectorMap::default();
        for (name, result) in results {
            match result {
                Ok(Some(file)) => map.insert(&name, file),
                Ok(None) => warn!(index = %name, "No constituent file linked"),
                Err(e) => warn!(index = %name, "Skipping index page: {e:#}"),
            }
        }
        Ok(map)
    }

    /// Scrape and write the map to `path`.
    pub async fn update(&self, path: &Path) -> Result<SectorMap> {
        let map = self.scrape().await?;
        anyhow::ensure!(!map.is_empty(), "Scrape found no constituent files");
        map.save(path)?;
        info!(path = %path.display(), indices = map.len(), "Sector map updated");
        Ok(map)
    }
}

fn html_text(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::rest_client::DEFAULT_TIMEOUT;

    fn scraper() -> SectorMapScraper {
        SectorMapScraper::new(RestClient::new(DEFAULT_TIMEOUT).unwrap(), 10).unwrap()
    }

    const LANDING: &str = r#"
        <ul class="nav">
            <li><a href="/about">About</a></li>
        </ul>
        <ul class="tabinsaidmenu clearfix">
            <li class="active"><a href="/indices/equity/broad-based-indices/nifty--50">NIFTY 50</a></li>
            <li><a href="/indices/equity/broad-based-indices/nifty-next-50"><span>NIFTY Next&nbsp;50</span></a></li>
            <li><a href="indices/equity/sectoral-indices/nifty-bank">NIFTY Bank</a></li>
            <li><a href="/indices/equity/sectoral-indices/nifty-fmcg"> </a></li>
        </ul>"#;

    #[test]
    fn test_index_pages_from_menu() {
        let pages = scraper().index_pages(LANDING);
        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages[0],
            (
                "NIFTY 50".to_string(),
                "https://www.niftyindices.com/indices/equity/broad-based-indices/nifty--50".to_string()
            )
        );
        assert_eq!(pages[1].0, "NIFTY Next 50");
        assert_eq!(pages[2].1, "https://www.niftyindices.com/indices/equity/sectoral-indices/nifty-bank");
    }

    #[test]
    fn test_constituent_link() {
        let page = r#"
            <a href="/Factsheet/ind_nifty_next_50.pdf">Factsheet</a>
            <a class="dwnld" href="https://www.niftyindices.com/IndexConstituent/ind_niftynext50list.csv">Download</a>"#;
        assert_eq!(scraper().constituent_file(page).as_deref(), Some("ind_niftynext50list.csv"));
        assert_eq!(scraper().constituent_file("<a href=\"/x.pdf\">x</a>"), None);
    }

    #[test]
    fn test_html_text() {
        assert_eq!(html_text("  NIFTY&nbsp;Auto &amp; Ancillaries "), "NIFTY Auto & Ancillaries");
    }
}
