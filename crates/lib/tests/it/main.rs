/*! Integration tests for Concord.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - merge: winner selection, tombstone precedence, idempotence, tie-breaks
 * - log: diff production and cursor semantics
 * - convergence: multi-node end-to-end convergence under reordering
 * - sync: coordinator sessions over the in-memory transport
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("concord=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod convergence;
mod helpers;
mod log;
