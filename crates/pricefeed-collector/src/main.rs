//! Pricefeed CLI.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pricefeed_collector::Services;
use pricefeed_core::{init_logging, normalize_symbol, AppConfig, LogConfig};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "pricefeed")]
#[command(about = "Quote feed and periodic portfolio balance reports", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본: config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 종목 검색
    Search {
        /// 회사명 또는 심볼
        query: String,
    },

    /// 현재가 조회 (쉼표로 구분, 예: "AAPL,MSFT")
    Quote { symbols: String },

    /// 스케줄러 한 주기 실행 (prewarm → fanout)
    Tick,

    /// 데몬 모드: 종료 신호까지 주기적으로 보고
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(Some(path)),
        None => AppConfig::load_default(),
    }
    .context("설정 로드 실패")?;

    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;

    let services = Services::from_config(&config)?;
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Search { query } => {
            let results = services.coordinator.search(&cancel, &query).await?;
            if results.is_empty() {
                println!(
                    "No tickers found for \"{}\". Try a company name or a symbol such as AAPL.",
                    query.trim()
                );
            } else {
                for ticker in results {
                    println!("{ticker} [{}]", ticker.instrument_type);
                }
            }
        }
        Commands::Quote { symbols } => {
            let requested: Vec<String> = symbols
                .split(',')
                .map(normalize_symbol)
                .filter(|s| !s.is_empty())
                .collect();
            if requested.is_empty() {
                anyhow::bail!("심볼을 하나 이상 입력하세요");
            }

            let quotes = services.coordinator.resolve(&cancel, &requested).await?;
            let mut missing = Vec::new();
            for symbol in &requested {
                match quotes.get(symbol) {
                    Some(quote) => println!("{quote}"),
                    None => missing.push(symbol.as_str()),
                }
            }
            if !missing.is_empty() {
                println!("No quote available for: {}", missing.join(", "));
            }
        }
        Commands::Tick => {
            services.scheduler.tick(&cancel).await;
        }
        Commands::Daemon => {
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        shutdown.cancel();
                    }
                    Err(e) => tracing::error!("종료 신호 핸들러 등록 실패: {}", e),
                }
            });

            services.scheduler.run(cancel).await;
        }
    }

    tracing::info!("Pricefeed 종료");
    Ok(())
}
