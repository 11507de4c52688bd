//! HTTP surface of the coordinator.
//!
//! Identity comes from the authenticating reverse proxy in front of the service; every route
//! resolves it through the [`identity`] extractors.

pub(crate) mod admin;
pub(crate) mod api;
pub(crate) mod error;
pub(crate) mod identity;
pub(crate) mod server;

use tracing::Instrument as _;

use self::error::ApiError;
use crate::lifecycle::LifecycleError;

/// Runs a lifecycle operation on its own task and waits for it.
///
/// Transitions call backing systems one after another and journal every stage. A request that
/// times out or whose client goes away only stops waiting; the operation still runs to its end.
pub(crate) async fn run_to_completion<T, F>(operation: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, LifecycleError>> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::spawn(operation.in_current_span()).await??)
}
