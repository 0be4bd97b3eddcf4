//! Attempt Ledger
//!
//! Per-address failure counter with time-windowed expiry. Every rejected
//! security-sensitive operation appends a record; an address is locked once
//! enough unexpired records accumulate.

use std::net::IpAddr;
use std::sync::Arc;

use platform::clock::Clock;
use platform::rate_limit::MitigationPolicy;

use crate::domain::entity::attempt::Attempt;
use crate::domain::repository::AttemptRepository;
use crate::error::AuthResult;

/// Attempt ledger service
pub struct AttemptLedger<A>
where
    A: AttemptRepository,
{
    repo: Arc<A>,
    policy: MitigationPolicy,
    clock: Arc<dyn Clock>,
}

impl<A> AttemptLedger<A>
where
    A: AttemptRepository,
{
    pub fn new(repo: Arc<A>, policy: MitigationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            policy,
            clock,
        }
    }

    /// Check whether an address has hit the mitigation threshold
    ///
    /// Expired records for the address are purged first, so the count only
    /// reflects the current window. Count-then-insert is not atomic across
    /// concurrent requests; up to `(in-flight requests - 1)` extra attempts
    /// can slip through before the lock engages.
    pub async fn is_locked(&self, ip: IpAddr) -> AuthResult<bool> {
        let now = self.clock.now();
        self.repo.delete_expired(now, Some(ip)).await?;

        let count = self.repo.count_for_ip(ip).await?;
        Ok(count >= self.policy.threshold)
    }

    /// Append a record expiring one mitigation window from now
    pub async fn record(&self, ip: IpAddr, note: impl Into<String>) -> AuthResult<()> {
        let note = note.into();
        let attempt = Attempt {
            ip,
            expire_at: self.clock.now() + self.policy.window_chrono(),
            note: note.clone(),
        };

        tracing::debug!(ip = %ip, note = %note, "Attempt recorded");

        self.repo.insert(&attempt).await
    }

    /// Delete expired records, for one address or globally
    ///
    /// Scoped to one address during request handling; the global sweep is
    /// driven by periodic maintenance.
    pub async fn purge_expired(&self, ip: Option<IpAddr>) -> AuthResult<u64> {
        self.repo.delete_expired(self.clock.now(), ip).await
    }
}
