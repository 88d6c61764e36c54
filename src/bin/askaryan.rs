//! Command line runner for the `askaryan` library.

#[cfg(not(feature = "for-testing"))]
#[quit::main]
fn main() {
    #[cfg(feature = "cli")]
    askaryan::cli::run::run();
}

#[cfg(feature = "for-testing")]
fn main() {
    #[cfg(feature = "cli")]
    {
        eprintln!(
            "Warning: The `for-testing` feature is enabled, which makes errors panic instead of exiting cleanly"
        );
        askaryan::cli::run::run();
    }
}
