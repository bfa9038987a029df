//! 잔고 계산.

use std::fmt;
use std::sync::Arc;

use pricefeed_core::ConsumerId;
use pricefeed_data::FetchCoordinator;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::BalanceError;
use crate::store::HoldingsStore;

/// 잔고 보고의 한 줄.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingLine {
    pub symbol: String,
    pub name: String,
    pub shares: Decimal,
    pub price: Decimal,
    pub currency: String,
    /// `shares × price`
    pub value: Decimal,
}

/// 소비자 한 명의 잔고 보고.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReport {
    pub consumer_id: ConsumerId,
    /// 시세를 얻은 보유 종목만 포함
    pub lines: Vec<HoldingLine>,
    pub total: Decimal,
    /// 직전 보고의 총액
    pub previous_total: Option<Decimal>,
}

impl BalanceReport {
    /// 총액 대비 비중 (%).
    pub fn share_of_total(&self, line: &HoldingLine) -> Decimal {
        if self.total.is_zero() {
            Decimal::ZERO
        } else {
            (line.value / self.total * Decimal::ONE_HUNDRED).round_dp(1)
        }
    }

    /// 직전 보고 대비 변화량.
    pub fn change(&self) -> Option<Decimal> {
        self.previous_total.map(|prev| self.total - prev)
    }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Portfolio balance")?;
        for line in &self.lines {
            writeln!(
                f,
                "{} ({}): {} × {} {} = {} ({:.1}%)",
                line.symbol,
                line.name,
                line.shares.normalize(),
                line.price.round_dp(2),
                line.currency,
                line.value.round_dp(2),
                self.share_of_total(line),
            )?;
        }
        write!(f, "Total: {}", self.total.round_dp(2))?;
        if let Some(change) = self.change() {
            let sign = if change.is_sign_negative() { "" } else { "+" };
            write!(f, " ({sign}{} since last report)", change.round_dp(2))?;
        }
        Ok(())
    }
}

/// 잔고 계산 서비스.
#[derive(Clone)]
pub struct BalanceService {
    store: Arc<dyn HoldingsStore>,
    coordinator: FetchCoordinator,
}

impl BalanceService {
    /// 새 서비스 생성.
    pub fn new(store: Arc<dyn HoldingsStore>, coordinator: FetchCoordinator) -> Self {
        Self { store, coordinator }
    }

    /// 소비자의 잔고를 계산합니다.
    ///
    /// 보유 종목이 없으면 `Ok(None)`, 보유 종목은 있지만 시세를 하나도 얻지
    /// 못하면 `BalanceError::NoQuotes`를 반환합니다. 시세가 없는 종목은 건너뜁니다.
    #[instrument(skip(self, cancel))]
    pub async fn compute_balance(
        &self,
        cancel: &CancellationToken,
        consumer_id: ConsumerId,
    ) -> Result<Option<BalanceReport>, BalanceError> {
        let holdings = self.store.holdings(consumer_id).await?;
        if holdings.is_empty() {
            debug!("No holdings");
            return Ok(None);
        }

        let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
        let quotes = match self.coordinator.resolve(cancel, &symbols).await {
            Ok(quotes) => quotes,
            Err(pricefeed_data::QuoteError::AllFailed { .. }) => {
                return Err(BalanceError::NoQuotes {
                    consumer_id,
                    symbols,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::with_capacity(holdings.len());
        for holding in holdings {
            let Some(quote) = quotes.get(&holding.symbol) else {
                warn!(symbol = %holding.symbol, "No quote for holding, skipping");
                continue;
            };
            lines.push(HoldingLine {
                value: holding.shares * quote.price,
                price: quote.price,
                currency: quote.currency.clone(),
                symbol: holding.symbol,
                name: holding.name,
                shares: holding.shares,
            });
        }

        if lines.is_empty() {
            return Err(BalanceError::NoQuotes {
                consumer_id,
                symbols,
            });
        }

        let total: Decimal = lines.iter().map(|l| l.value).sum();
        let previous_total = self
            .store
            .last_snapshot(consumer_id)
            .await?
            .map(|s| s.total);

        Ok(Some(BalanceReport {
            consumer_id,
            lines,
            total,
            previous_total,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn report(previous_total: Option<Decimal>) -> BalanceReport {
        BalanceReport {
            consumer_id: 1,
            lines: vec![
                HoldingLine {
                    symbol: "AAPL".to_string(),
                    name: "Apple Inc.".to_string(),
                    shares: dec!(10),
                    price: dec!(150),
                    currency: "USD".to_string(),
                    value: dec!(1500),
                },
                HoldingLine {
                    symbol: "TSLA".to_string(),
                    name: "Tesla".to_string(),
                    shares: dec!(2.50),
                    price: dec!(200),
                    currency: "USD".to_string(),
                    value: dec!(500),
                },
            ],
            total: dec!(2000),
            previous_total,
        }
    }

    #[test]
    fn test_share_of_total() {
        let report = report(None);
        assert_eq!(report.share_of_total(&report.lines[0]), dec!(75.0));
        assert_eq!(report.share_of_total(&report.lines[1]), dec!(25.0));
    }

    #[test]
    fn test_report_display() {
        let text = report(Some(dec!(1900))).to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Portfolio balance");
        assert_eq!(lines[1], "AAPL (Apple Inc.): 10 × 150 USD = 1500 (75.0%)");
        assert_eq!(lines[2], "TSLA (Tesla): 2.5 × 200 USD = 500 (25.0%)");
        assert_eq!(lines[3], "Total: 2000 (+100 since last report)");
    }

    #[test]
    fn test_report_display_negative_change() {
        let text = report(Some(dec!(2100.456))).to_string();
        assert!(text.ends_with("Total: 2000 (-100.46 since last report)"));

        let text = report(None).to_string();
        assert!(text.ends_with("Total: 2000"));
    }

    #[test]
    fn test_zero_total_share() {
        let mut report = report(None);
        report.total = Decimal::ZERO;
        assert_eq!(report.share_of_total(&report.lines[0]), Decimal::ZERO);
    }
}
