//! Scoped transactions over a shared executor handle.
//!
//! ```
//! # use quarry_core::{Executor, Result, TransactionManager};
//! # async fn demo<X: Executor>(executor: X) -> Result<()> {
//! let mut tx = TransactionManager::new(executor);
//! tx.run(async || {
//!     // repositories sharing the same handle run inside the transaction
//!     Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use core::ops::AsyncFnOnce;

use crate::dialect::Executor;
use crate::error::{Result, UsageError};
use crate::QuarryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        }
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// One transaction on one executor handle: `idle → active → committed | rolled back`.
///
/// A manager is single-use; beginning again after a terminal state is a
/// [`UsageError`]. Nested transactions on one handle are rejected by the handle.
#[derive(Debug)]
pub struct TransactionManager<X: Executor> {
    executor: X,
    state: TransactionState,
}

impl<X: Executor> TransactionManager<X> {
    pub fn new(executor: X) -> Self {
        Self {
            executor,
            state: TransactionState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[inline]
    pub fn executor(&self) -> &X {
        &self.executor
    }

    fn misuse(&self, action: &'static str) -> QuarryError {
        UsageError::TransactionState {
            action,
            state: self.state.as_str(),
        }
        .into()
    }

    pub async fn begin(&mut self) -> Result<()> {
        if self.state != TransactionState::Idle {
            return Err(self.misuse("begin"));
        }
        if !self.executor.supports_transactions() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                driver = <X::Dialect as crate::Dialect>::NAME,
                "transactions are not atomic on this backend"
            );
        }
        self.executor.begin().await?;
        self.state = TransactionState::Active;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(self.misuse("commit"));
        }
        // A failed commit ends the transaction on the server; nothing is left to roll back.
        let result = self.executor.commit().await;
        self.state = if result.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::RolledBack
        };
        result
    }

    pub async fn rollback(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(self.misuse("roll back"));
        }
        self.state = TransactionState::RolledBack;
        self.executor.rollback().await?;
        Ok(())
    }

    /// Runs `scope` inside the transaction: commits when it returns `Ok`, rolls
    /// back and returns its error otherwise.
    pub async fn run<R>(&mut self, scope: impl AsyncFnOnce() -> Result<R>) -> Result<R> {
        self.begin().await?;
        match scope().await {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(_rollback_error) = self.rollback().await {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_rollback_error, "rollback failed");
                }
                Err(error)
            }
        }
    }
}

impl<X: Executor> Drop for TransactionManager<X> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                driver = <X::Dialect as crate::Dialect>::NAME,
                "transaction dropped while active; it will not be rolled back"
            );
        }
    }
}
