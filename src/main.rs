use clap::Parser;
use otp_import_app::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    otp_import_app::run(Cli::parse()).await
}
