// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound connectivity probe contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::fault::Fault;

/// Checks that the publishing platform is reachable.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + 'static {
    /// What is being probed (URL or host), for reports.
    fn target(&self) -> &str;

    /// Probe once and return the observed round-trip latency.
    async fn probe(&self) -> Result<Duration, Fault>;
}
