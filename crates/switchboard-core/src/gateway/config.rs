use std::time::Duration;

use switchboard_types::gateway::intents;

/// Timeouts and recovery policy for the gateway client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Longest wait for any inbound frame before the connection is
    /// considered dead and resumed.
    pub read_timeout: Duration,
    /// Bound on each dial, both initial and during recovery.
    pub dial_timeout: Duration,
    /// Bound on each outbound frame.
    pub write_timeout: Duration,
    pub resume: ResumePolicy,
    /// Capability flags sent with Identify.
    pub intents: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(45),
            dial_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(3),
            resume: ResumePolicy::default(),
            intents: intents::DEFAULT,
        }
    }
}

/// Bounded retry with exponential backoff for Resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ResumePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ResumePolicy {
    /// Delay before attempt `attempt` (1-based). The first attempt is immediate.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
