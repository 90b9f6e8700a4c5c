use chrono::{Duration, Local, Utc};
use etfolio::cli::add::NewTransaction;
use etfolio::cli::dashboard::DashboardOptions;
use etfolio::core::price::ChartPeriod;
use etfolio::{AppCommand, WatchCommand};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbol: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let url_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(&url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }
}

fn chart_response() -> String {
    let now = Utc::now();
    let ts_1y = (now - Duration::days(400)).timestamp();
    let ts_6m = (now - Duration::days(180)).timestamp();
    let ts_1d = (now - Duration::days(1)).timestamp();

    format!(
        r#"
    {{
        "chart": {{
            "result": [
                {{
                    "meta": {{
                        "regularMarketPrice": 520.0,
                        "chartPreviousClose": 515.0,
                        "currency": "EUR",
                        "longName": "iShares Core S&P 500 UCITS ETF"
                    }},
                    "timestamp": [{ts_1y}, {ts_6m}, {ts_1d}],
                    "indicators": {{
                        "quote": [{{
                            "close": [400.0, 470.0, 515.0]
                        }}]
                    }}
                }}
            ]
        }}
    }}"#
    )
}

/// Writes a config pointing at `server_uri` with all data under `data_dir`.
fn write_config(data_dir: &Path, server_uri: &str) -> String {
    let config_path = data_dir.join("config.yaml");
    let config_content = format!(
        r#"
        currency: "EUR"
        providers:
          yahoo:
            base_url: {}
        storage:
          data_path: {}
        cache:
          ttl_minutes: 0
    "#,
        server_uri,
        data_dir.display()
    );
    fs::write(&config_path, config_content).expect("Failed to write config file");
    config_path.to_string_lossy().into_owned()
}

fn write_transactions(data_dir: &Path) {
    let older = (Local::now() - Duration::days(400)).date_naive();
    let recent = (Local::now() - Duration::days(30)).date_naive();
    let content = format!(
        "Date,ISIN,Ticker,Price,Quantity\n\
         {older},IE00B5BMR087,SXR8.DE,400.0,2\n\
         {recent},IE00B5BMR087,SXR8.DE,500.0,1\n"
    );
    fs::write(data_dir.join("transactions.csv"), content).expect("Failed to write transactions");
}

async fn run(command: AppCommand, config_path: &str) {
    let result = etfolio::run_command(command, Some(config_path)).await;
    assert!(
        result.is_ok(),
        "Command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = test_utils::create_mock_server("SXR8.DE", &chart_response()).await;
    let data_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(data_dir.path(), &mock_server.uri());
    write_transactions(data_dir.path());

    info!("Running report commands against {}", mock_server.uri());
    run(AppCommand::Portfolio, &config_path).await;
    run(AppCommand::Transactions, &config_path).await;
    run(AppCommand::History { limit: 10 }, &config_path).await;
    run(AppCommand::Compare, &config_path).await;
}

#[test_log::test(tokio::test)]
async fn test_add_resolves_bare_ticker_and_watches_it() {
    let mock_server = test_utils::create_mock_server("SXR8.DE", &chart_response()).await;
    let data_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(data_dir.path(), &mock_server.uri());

    run(
        AppCommand::Add(NewTransaction {
            ticker: "sxr8".to_string(),
            quantity: 3.0,
            price: 510.0,
            date: Some("02/01/2025".to_string()),
            isin: None,
        }),
        &config_path,
    )
    .await;

    let transactions = fs::read_to_string(data_dir.path().join("transactions.csv")).unwrap();
    assert!(
        transactions.contains("2025-01-02,,SXR8.DE,510,3"),
        "unexpected transactions file: {transactions}"
    );
    let watchlist = fs::read_to_string(data_dir.path().join("watchlist.csv")).unwrap();
    assert_eq!(watchlist.lines().collect::<Vec<_>>(), vec!["Ticker", "SXR8.DE"]);

    run(AppCommand::Watch(WatchCommand::List), &config_path).await;
    run(
        AppCommand::Dashboard(DashboardOptions {
            period: ChartPeriod::OneYear,
            change_period: ChartPeriod::OneDay,
            bars: 3,
        }),
        &config_path,
    )
    .await;
    run(
        AppCommand::Watch(WatchCommand::Remove {
            ticker: "sxr8.de".to_string(),
        }),
        &config_path,
    )
    .await;

    let watchlist = fs::read_to_string(data_dir.path().join("watchlist.csv")).unwrap();
    assert_eq!(watchlist.lines().collect::<Vec<_>>(), vec!["Ticker"]);
}

#[test_log::test(tokio::test)]
async fn test_invalid_transaction_is_rejected() {
    let mock_server = test_utils::create_mock_server("SXR8.DE", &chart_response()).await;
    let data_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(data_dir.path(), &mock_server.uri());

    let result = etfolio::run_command(
        AppCommand::Add(NewTransaction {
            ticker: "SXR8".to_string(),
            quantity: -1.0,
            price: 510.0,
            date: None,
            isin: None,
        }),
        Some(&config_path),
    )
    .await;

    assert!(result.is_err());
    assert!(!data_dir.path().join("transactions.csv").exists());
}

#[test_log::test(tokio::test)]
async fn test_search_without_hits_succeeds() {
    let mock_server = wiremock::MockServer::start().await;
    let data_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(data_dir.path(), &mock_server.uri());

    run(
        AppCommand::Search {
            query: "IE00B5BMR087".to_string(),
        },
        &config_path,
    )
    .await;
}

#[test_log::test(tokio::test)]
async fn test_missing_config_is_reported() {
    let data_dir = TempDir::new().expect("Failed to create temp dir");
    let missing = data_dir.path().join("absent.yaml");

    let result = etfolio::run_command(AppCommand::Portfolio, missing.to_str()).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
