// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.

use crate::document::GroupId;

/// Enable log output for tests when `RUST_LOG` is set.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Turn string literals into group ids, keeping their order.
pub fn group_ids(ids: &[&str]) -> Vec<GroupId> {
    ids.iter().map(|id| GroupId::from(*id)).collect()
}
