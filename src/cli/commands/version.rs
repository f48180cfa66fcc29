use crate::cli::output::Output;
use crate::errors::Result;
use crate::vcs::{Provider, VcsServerFactory};

/// Show version information
pub async fn run() -> Result<()> {
    Output::section("vcs-bridge");
    Output::sub_item(format!("Version: {}", env!("CARGO_PKG_VERSION")));
    Output::sub_item(format!("Description: {}", env!("CARGO_PKG_DESCRIPTION")));

    Output::section("Build Information");
    Output::sub_item(format!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION")));
    Output::sub_item(format!("Target: {}", std::env::consts::ARCH));
    Output::sub_item(format!("OS: {}", std::env::consts::OS));

    #[cfg(debug_assertions)]
    Output::sub_item("Build type: Debug");
    #[cfg(not(debug_assertions))]
    Output::sub_item("Build type: Release");

    Output::section("Providers");
    for provider in Provider::ALL {
        let state = if VcsServerFactory::is_provider_supported(&provider) {
            "available"
        } else {
            "not implemented"
        };
        Output::sub_item(format!("{provider}: {state}"));
    }

    Ok(())
}
