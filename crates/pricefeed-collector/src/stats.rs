//! 스케줄러 실행 통계.

use std::time::Duration;

/// 한 번의 tick 통계
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    /// 추적 중인 심볼 수
    pub symbols: usize,
    /// 미리 조회에 성공한 심볼 수
    pub prewarmed: usize,
    /// 미리 조회에 실패한 심볼 수
    pub prewarm_failed: usize,
    /// 대상 소비자 수
    pub consumers: usize,
    /// 보고를 전달한 소비자 수
    pub notified: usize,
    /// 건너뛴 소비자 수 (보유 종목 없음)
    pub skipped: usize,
    /// 실패한 소비자 수
    pub failed: usize,
    /// 취소로 중단되었는지
    pub cancelled: bool,
    /// 소요 시간
    pub elapsed: Duration,
}

impl TickStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 전달 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.consumers == 0 {
            0.0
        } else {
            (self.notified as f64 / self.consumers as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self) {
        tracing::info!(
            symbols = self.symbols,
            prewarmed = self.prewarmed,
            prewarm_failed = self.prewarm_failed,
            consumers = self.consumers,
            notified = self.notified,
            skipped = self.skipped,
            failed = self.failed,
            cancelled = self.cancelled,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "Tick 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut stats = TickStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.consumers = 4;
        stats.notified = 3;
        assert_eq!(stats.success_rate(), 75.0);
    }
}
