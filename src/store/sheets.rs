//! Google Sheets values API store.
//!
//! Transactions live in the first sheet (`A:E`, header row first, columns in
//! any order) and the watchlist in column A of a `Watchlist` sheet.

use crate::core::error::PersistenceError;
use crate::core::persistence::{TransactionStore, WatchlistStore};
use crate::core::transaction::{COLUMNS, REQUIRED_COLUMNS, Transaction};
use crate::providers::util::with_retry;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

const WATCHLIST_SHEET: &str = "Watchlist";
const WATCHLIST_HEADER: &str = "Ticker";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsStore {
    base_url: String,
    spreadsheet_id: String,
    transactions_sheet: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl SheetsStore {
    pub fn new(
        base_url: &str,
        spreadsheet_id: &str,
        transactions_sheet: &str,
        access_token: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            transactions_sheet: transactions_sheet.to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, last_segment: &str) -> Result<Url, PersistenceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PersistenceError::Unreachable(format!("invalid sheets url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| PersistenceError::Unreachable("sheets url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .push(last_segment);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, PersistenceError> {
        let mut url = self.url(&self.spreadsheet_id)?;
        url.path_segments_mut()
            .map_err(|_| PersistenceError::Unreachable("sheets url cannot be a base".to_string()))?
            .extend(["values", range]);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<B>(&self, build: B) -> Result<Response, PersistenceError>
    where
        B: Fn() -> RequestBuilder,
    {
        with_retry(|| self.authorized(build()).send(), 2, 300)
            .await
            .map_err(|e| PersistenceError::Unreachable(e.to_string()))
    }

    async fn get_values(&self, range: &str) -> Result<Option<Vec<Vec<String>>>, PersistenceError> {
        let url = self.values_url(range)?;
        debug!("Reading sheet range from {}", url);
        let response = self
            .send(|| self.client.get(url.clone()))
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            debug!("Range {range} does not exist");
            return Ok(None);
        }
        let response = check_status(response, &url)?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| PersistenceError::Schema(format!("invalid values response: {e}")))?;

        Ok(Some(
            body.values
                .into_iter()
                .map(|row| row.iter().map(cell_text).collect())
                .collect(),
        ))
    }

    async fn add_sheet(&self, title: &str) -> Result<(), PersistenceError> {
        let url = self.url(&format!("{}:batchUpdate", self.spreadsheet_id))?;
        let body = json!({ "requests": [{ "addSheet": { "properties": { "title": title } } }] });
        let response = self
            .send(|| self.client.post(url.clone()).json(&body))
            .await?;
        check_status(response, &url)?;
        debug!("Created sheet {title}");
        Ok(())
    }
}

fn check_status(response: Response, url: &Url) -> Result<Response, PersistenceError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(PersistenceError::Unreachable(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )))
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_rows(rows: &[Vec<String>]) -> Result<Vec<Transaction>, PersistenceError> {
    let Some((header, rows)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let index = |name: &str| header.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

    let mut required = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for column in REQUIRED_COLUMNS {
        required.push(index(column).ok_or_else(|| {
            PersistenceError::Schema(format!("sheet has no {column} column"))
        })?);
    }
    let isin = index("ISIN");

    let mut transactions = Vec::with_capacity(rows.len());
    for (line, row) in rows.iter().enumerate() {
        let field = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        match Transaction::from_fields(
            field(required[0]),
            isin.map_or("", field),
            field(required[1]),
            field(required[2]),
            field(required[3]),
        ) {
            Ok(tx) => transactions.push(tx),
            Err(e) => warn!("Skipping sheet row {}: {e}", line + 2),
        }
    }
    Ok(transactions)
}

#[async_trait]
impl TransactionStore for SheetsStore {
    fn name(&self) -> &str {
        "sheets"
    }

    #[instrument(name = "SheetsLoadTransactions", skip(self))]
    async fn load_transactions(&self) -> Result<Vec<Transaction>, PersistenceError> {
        let range = format!("{}!A:E", self.transactions_sheet);
        let rows = self.get_values(&range).await?.ok_or_else(|| {
            PersistenceError::Schema(format!("sheet {} not found", self.transactions_sheet))
        })?;
        let transactions = parse_rows(&rows)?;
        debug!("Loaded {} transactions from sheet", transactions.len());
        Ok(transactions)
    }

    #[instrument(name = "SheetsAppendTransaction", skip(self, transaction), fields(ticker = %transaction.ticker()))]
    async fn append_transaction(&self, transaction: &Transaction) -> Result<(), PersistenceError> {
        let header = self
            .get_values(&format!("{}!1:1", self.transactions_sheet))
            .await?
            .ok_or_else(|| {
                PersistenceError::Schema(format!("sheet {} not found", self.transactions_sheet))
            })?
            .into_iter()
            .next()
            .unwrap_or_default();
        let values = row_for_header(&header, transaction)?;

        let mut url = self.values_url(&format!("{}!A:E:append", self.transactions_sheet))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = json!({ "values": values });
        let response = self
            .send(|| self.client.post(url.clone()).json(&body))
            .await?;
        check_status(response, &url)?;
        Ok(())
    }
}

/// Rows to append for `transaction`, laid out like the sheet's header row.
/// A sheet without a header gets one written first.
fn row_for_header(
    header: &[String],
    transaction: &Transaction,
) -> Result<Vec<Vec<Value>>, PersistenceError> {
    let cells = [
        json!(transaction.date().format("%Y-%m-%d").to_string()),
        json!(transaction.isin()),
        json!(transaction.ticker()),
        json!(transaction.price()),
        json!(transaction.quantity()),
    ];
    if header.iter().all(|h| h.trim().is_empty()) {
        return Ok(vec![COLUMNS.iter().map(|c| json!(c)).collect(), cells.to_vec()]);
    }

    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|c| !header.iter().any(|h| h.trim().eq_ignore_ascii_case(c)))
    {
        return Err(PersistenceError::Schema(format!("sheet has no {missing} column")));
    }
    let row = header
        .iter()
        .map(|h| {
            COLUMNS
                .iter()
                .position(|c| h.trim().eq_ignore_ascii_case(c))
                .map_or_else(|| json!(""), |i| cells[i].clone())
        })
        .collect();
    Ok(vec![row])
}

#[async_trait]
impl WatchlistStore for SheetsStore {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn load_watchlist(&self) -> Result<Vec<String>, PersistenceError> {
        let rows = self
            .get_values(&format!("{WATCHLIST_SHEET}!A:A"))
            .await?
            .unwrap_or_default();
        Ok(rows
            .into_iter()
            .skip(1)
            .filter_map(|row| row.into_iter().next())
            .map(|ticker| ticker.trim().to_string())
            .filter(|ticker| !ticker.is_empty())
            .collect())
    }

    async fn save_watchlist(&self, tickers: &[String]) -> Result<(), PersistenceError> {
        let clear_url = self.values_url(&format!("{WATCHLIST_SHEET}!A:A:clear"))?;
        let response = self
            .send(|| self.client.post(clear_url.clone()).json(&json!({})))
            .await?;
        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            self.add_sheet(WATCHLIST_SHEET).await?;
        } else {
            check_status(response, &clear_url)?;
        }

        let mut url = self.values_url(&format!("{WATCHLIST_SHEET}!A1"))?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let values: Vec<Vec<&str>> = std::iter::once(WATCHLIST_HEADER)
            .chain(tickers.iter().map(String::as_str))
            .map(|cell| vec![cell])
            .collect();
        let body = json!({ "values": values });
        let response = self
            .send(|| self.client.put(url.clone()).json(&body))
            .await?;
        check_status(response, &url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SHEET_ID: &str = "sheet-123";

    fn store(server: &MockServer) -> SheetsStore {
        SheetsStore::new(&server.uri(), SHEET_ID, "Sheet1", Some("tok".to_string()))
    }

    async fn mount_values(server: &MockServer, range: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v4/spreadsheets/{SHEET_ID}/values/{range}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test_log::test(tokio::test)]
    async fn test_load_transactions_maps_columns_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v4/spreadsheets/{SHEET_ID}/values/Sheet1!A:E")))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Sheet1!A1:E4",
                "values": [
                    ["Ticker", "Date", "Price", "Quantity", "ISIN"],
                    ["SWDA.MI", "2025-01-01", "70", "10", "IE00B4L5Y983"],
                    ["SXR8.DE", "15/01/2025", 400.5, 1],
                    [],
                    ["BROKEN", "not a date", "1", "1"]
                ]
            })))
            .mount(&server)
            .await;

        let transactions = store(&server).load_transactions().await.unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].isin(), "IE00B4L5Y983");
        assert_eq!(transactions[1].price(), 400.5);
        assert_eq!(
            transactions[1].date(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_load_transactions_rejects_missing_columns() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Sheet1!A:E",
            200,
            json!({ "values": [["Date", "Ticker"], ["2025-01-01", "SWDA.MI"]] }),
        )
        .await;

        let result = store(&server).load_transactions().await;
        assert!(matches!(result, Err(PersistenceError::Schema(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_server_error_is_unreachable() {
        let server = MockServer::start().await;
        mount_values(&server, "Sheet1!A:E", 503, json!({})).await;

        let result = store(&server).load_transactions().await;
        assert!(matches!(result, Err(PersistenceError::Unreachable(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_sheet_has_no_transactions() {
        let server = MockServer::start().await;
        mount_values(&server, "Sheet1!A:E", 200, json!({ "range": "Sheet1!A1:E1" })).await;

        assert!(store(&server).load_transactions().await.unwrap().is_empty());
    }

    fn sample_transaction() -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            "",
            "SWDA.MI",
            80.0,
            5.0,
        )
        .unwrap()
    }

    async fn mount_append(server: &MockServer, values: Value, calls: u64) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/v4/spreadsheets/{SHEET_ID}/values/Sheet1!A:E:append"
            )))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(body_json(json!({ "values": values })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[test_log::test(tokio::test)]
    async fn test_append_transaction_posts_row() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Sheet1!1:1",
            200,
            json!({ "values": [["Date", "ISIN", "Ticker", "Price", "Quantity"]] }),
        )
        .await;
        mount_append(&server, json!([["2025-02-01", "", "SWDA.MI", 80.0, 5.0]]), 1).await;

        store(&server)
            .append_transaction(&sample_transaction())
            .await
            .unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_append_follows_sheet_column_order() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Sheet1!1:1",
            200,
            json!({ "values": [["Ticker", "Quantity", "Price", "Date", "Notes"]] }),
        )
        .await;
        mount_append(&server, json!([["SWDA.MI", 5.0, 80.0, "2025-02-01", ""]]), 1).await;

        store(&server)
            .append_transaction(&sample_transaction())
            .await
            .unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_append_to_empty_sheet_writes_header() {
        let server = MockServer::start().await;
        mount_values(&server, "Sheet1!1:1", 200, json!({ "range": "Sheet1!1:1" })).await;
        mount_append(
            &server,
            json!([
                ["Date", "ISIN", "Ticker", "Price", "Quantity"],
                ["2025-02-01", "", "SWDA.MI", 80.0, 5.0]
            ]),
            1,
        )
        .await;

        store(&server)
            .append_transaction(&sample_transaction())
            .await
            .unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_append_rejects_header_without_required_column() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Sheet1!1:1",
            200,
            json!({ "values": [["Date", "Ticker", "Price"]] }),
        )
        .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let result = store(&server).append_transaction(&sample_transaction()).await;
        assert!(matches!(result, Err(PersistenceError::Schema(_))));
    }

    #[test_log::test(tokio::test)]
    async fn test_load_watchlist_skips_header() {
        let server = MockServer::start().await;
        mount_values(
            &server,
            "Watchlist!A:A",
            200,
            json!({ "values": [["Ticker"], ["SWDA.MI"], [" "], ["SXR8.DE"]] }),
        )
        .await;

        assert_eq!(
            store(&server).load_watchlist().await.unwrap(),
            vec!["SWDA.MI", "SXR8.DE"]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_save_watchlist_creates_missing_sheet() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!(
                "/v4/spreadsheets/{SHEET_ID}/values/Watchlist!A:A:clear"
            )))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v4/spreadsheets/{SHEET_ID}:batchUpdate")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("/v4/spreadsheets/{SHEET_ID}/values/Watchlist!A1")))
            .and(body_json(json!({ "values": [["Ticker"], ["SWDA.MI"]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .save_watchlist(&["SWDA.MI".to_string()])
            .await
            .unwrap();
    }
}
