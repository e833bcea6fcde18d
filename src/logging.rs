//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber
///
/// `verbose` turns on debug output for this crate; otherwise `RUST_LOG` decides,
/// falling back to warnings only. Calling this more than once is harmless.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("semantic_router_llm=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // A global subscriber may already be set (by the host or an earlier call)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init(true);
        init(false);
        tracing::debug!("still alive");
    }
}
