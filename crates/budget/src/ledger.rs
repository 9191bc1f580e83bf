//! Per-session token ledger.
//!
//! Checks are prospective: a charge that would cross the ceiling is refused
//! before the costed call runs, and the running total is left untouched.

use std::sync::Mutex;

use dossier_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Serializable view of a session's spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub session_id: String,
    pub ceiling: u64,
    pub used: u64,
    pub remaining: u64,
    /// Accepted charges.
    pub charges: u64,
    /// Charges refused for crossing the ceiling.
    pub rejections: u64,
}

#[derive(Debug, Default)]
struct Totals {
    used: u64,
    charges: u64,
    rejections: u64,
}

/// Token budget owned by one session.
#[derive(Debug)]
pub struct SessionBudget {
    session_id: String,
    ceiling: u64,
    totals: Mutex<Totals>,
}

impl SessionBudget {
    pub fn new(session_id: impl Into<String>, ceiling: u64) -> Self {
        Self {
            session_id: session_id.into(),
            ceiling,
            totals: Mutex::new(Totals::default()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    fn totals(&self) -> std::sync::MutexGuard<'_, Totals> {
        self.totals.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn exceeded(&self, requested: u64, used: u64) -> Error {
        Error::BudgetExceeded {
            session_id: self.session_id.clone(),
            requested,
            used,
            ceiling: self.ceiling,
        }
    }

    /// Would charging `amount` stay within the ceiling?
    pub fn check(&self, amount: u64) -> Result<()> {
        let used = self.totals().used;
        if used.saturating_add(amount) > self.ceiling {
            return Err(self.exceeded(amount, used));
        }
        Ok(())
    }

    /// Charge `amount`, or refuse without charging anything.
    ///
    /// Returns the new running total.
    pub fn track(&self, amount: u64) -> Result<u64> {
        let mut totals = self.totals();
        let projected = totals.used.saturating_add(amount);
        if projected > self.ceiling {
            totals.rejections += 1;
            tracing::warn!(
                session_id = %self.session_id,
                requested = amount,
                used = totals.used,
                ceiling = self.ceiling,
                "Token budget would be exceeded, refusing charge"
            );
            return Err(self.exceeded(amount, totals.used));
        }
        totals.used = projected;
        totals.charges += 1;
        Ok(projected)
    }

    /// Replace an earlier reservation with the actual spend.
    ///
    /// Refunds the unused part of `reserved`. An overrun is charged in full,
    /// since the call has already happened.
    pub fn settle(&self, reserved: u64, actual: u64) {
        let mut totals = self.totals();
        totals.used = totals.used.saturating_sub(reserved).saturating_add(actual);
        if totals.used > self.ceiling {
            tracing::warn!(
                session_id = %self.session_id,
                used = totals.used,
                ceiling = self.ceiling,
                "Actual spend overran the session ceiling"
            );
        }
    }

    pub fn used(&self) -> u64 {
        self.totals().used
    }

    pub fn remaining(&self) -> u64 {
        self.ceiling.saturating_sub(self.used())
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        let totals = self.totals();
        BudgetSnapshot {
            session_id: self.session_id.clone(),
            ceiling: self.ceiling,
            used: totals.used,
            remaining: self.ceiling.saturating_sub(totals.used),
            charges: totals.charges,
            rejections: totals.rejections,
        }
    }
}
