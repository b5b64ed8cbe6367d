use clap::Parser;
use docqa_cli::{Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        docqa_telemetry::init_json("docqa")?;
    } else {
        docqa_telemetry::init_telemetry("docqa")?;
    }
    run(cli).await
}
