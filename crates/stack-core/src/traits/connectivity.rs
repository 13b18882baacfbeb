//! Platform connectivity trait.

use async_trait::async_trait;
use serde::Serialize;

/// Reports whether the platform believes it has network connectivity.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// `Some(false)` when the platform reports being offline, `None` when it
    /// cannot tell.
    async fn is_online(&self) -> Option<bool>;
}

/// A connectivity snapshot, as recorded in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    pub on_line: Option<bool>,
}

impl ConnectivityState {
    /// Query `connectivity` once.
    pub async fn probe(connectivity: &dyn Connectivity) -> Self {
        Self {
            on_line: connectivity.is_online().await,
        }
    }

    /// Returns true only if the platform positively reports being offline.
    pub fn is_offline(&self) -> bool {
        self.on_line == Some(false)
    }
}

/// A connectivity source that never knows.
///
/// Processes have no equivalent of a browser's online flag, so unless a
/// caller plugs in a real source the offline shortcut is never taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

#[async_trait]
impl Connectivity for AssumeOnline {
    async fn is_online(&self) -> Option<bool> {
        None
    }
}
