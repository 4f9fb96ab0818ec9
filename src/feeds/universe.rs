//! Index constituents mapped to Fyers trading symbols.

use crate::execution::rest_client::{RestClient, RestRequest};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

pub const CONSTITUENT_BASE: &str = "https://www.niftyindices.com/IndexConstituent";
pub const SYMBOL_MASTER_URL: &str = "https://public.fyers.in/sym_details/NSE_CM.csv";

const ISIN_HEADER: &str = "ISIN Code";
// Headerless symbol master layout
const MASTER_ISIN_COL: usize = 5;
const MASTER_SYMBOL_COL: usize = 9;

/// Lowercased index name → constituent CSV file name on niftyindices.com.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorMap {
    files: BTreeMap<String, String>,
}

impl SectorMap {
    pub fn new(files: BTreeMap<String, String>) -> Self {
        Self {
            files: files.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sector map {} (run update-sector-map)", path.display()))?;
        let files: BTreeMap<String, String> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse sector map {}", path.display()))?;
        Ok(Self::new(files))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.files).context("Failed to serialise sector map")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write sector map {}", path.display()))
    }

    pub fn insert(&mut self, index: &str, file: impl Into<String>) {
        self.files.insert(index.to_lowercase(), file.into());
    }

    pub fn constituent_file(&self, index: &str) -> Option<&str> {
        self.files.get(&index.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// ISINs from an index constituent CSV (`ISIN Code` column).
pub fn parse_constituent_isins(text: &str) -> Result<HashSet<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let col = reader
        .headers()
        .context("Constituent CSV has no header row")?
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(ISIN_HEADER))
        .with_context(|| format!("Constituent CSV has no `{ISIN_HEADER}` column"))?;

    let mut isins = HashSet::new();
    for record in reader.records() {
        let record = record.context("Bad constituent CSV row")?;
        if let Some(isin) = record.get(col).filter(|s| !s.is_empty()) {
            isins.insert(isin.to_string());
        }
    }
    Ok(isins)
}

/// (ISIN, symbol) pairs from the headerless Fyers symbol master.
pub fn parse_symbol_master(text: &str) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Bad symbol master row")?;
        if let (Some(isin), Some(symbol)) = (record.get(MASTER_ISIN_COL), record.get(MASTER_SYMBOL_COL)) {
            if !isin.is_empty() && !symbol.is_empty() {
                rows.push((isin.to_string(), symbol.to_string()));
            }
        }
    }
    Ok(rows)
}

/// Master symbols whose ISIN belongs to the index, in master order.
pub fn select_symbols(master: &[(String, String)], isins: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    master
        .iter()
        .filter(|(isin, _)| isins.contains(isin))
        .filter(|(_, symbol)| seen.insert(symbol.clone()))
        .map(|(_, symbol)| symbol.clone())
        .collect()
}

/// Resolves a benchmark index to tradable symbols.
pub struct Universe {
    client: RestClient,
    sector_map: SectorMap,
    constituent_base: String,
    symbol_master_url: String,
}

impl Universe {
    pub fn new(client: RestClient, sector_map: SectorMap) -> Self {
        Self {
            client,
            sector_map,
            constituent_base: CONSTITUENT_BASE.into(),
            symbol_master_url: SYMBOL_MASTER_URL.into(),
        }
    }

    pub fn with_sources(mut self, constituent_base: &str, symbol_master_url: &str) -> Self {
        self.constituent_base = constituent_base.trim_end_matches('/').to_string();
        self.symbol_master_url = symbol_master_url.to_string();
        self
    }

    pub async fn symbols(&self, index: &str) -> Result<Vec<String>> {
        let file = self
            .sector_map
            .constituent_file(index)
            .with_context(|| format!("Unknown benchmark index `{index}`"))?;

        let constituents = self
            .client
            .send_text(&RestRequest::get(format!("{}/{file}", self.constituent_base)))
            .await
            .with_context(|| format!("Failed to download constituents for `{index}`"))?;
        let isins = parse_constituent_isins(&constituents)?;

        let master = self
            .client
            .send_text(&RestRequest::get(self.symbol_master_url.as_str()))
            .await
            .context("Failed to download the symbol master")?;
        let symbols = select_symbols(&parse_symbol_master(&master)?, &isins);

        info!(index, constituents = isins.len(), symbols = symbols.len(), "Universe resolved");
        Ok(symbols)
    }
}
