use super::{print_warning, ui};
use crate::core::price::{MarketDataProvider, SearchHit};
use anyhow::Result;
use comfy_table::Cell;
use tracing::warn;

pub async fn run(provider: &(dyn MarketDataProvider + Send + Sync), query: &str) -> Result<()> {
    let hits = search(provider, query).await;
    if hits.is_empty() {
        println!("No matches for {query}");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Exchange"),
        ui::header_cell("Type"),
    ]);
    for hit in &hits {
        table.add_row(vec![
            Cell::new(&hit.symbol),
            Cell::new(&hit.name),
            Cell::new(&hit.exchange),
            Cell::new(&hit.quote_type),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Search hits for an ISIN, ticker or name. A failed search is reported and
/// yields no hits.
pub async fn search(provider: &(dyn MarketDataProvider + Send + Sync), query: &str) -> Vec<SearchHit> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    match provider.search(query).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!("Search for {query} failed: {e}");
            print_warning(&format!("Search for {query} failed"));
            Vec::new()
        }
    }
}
