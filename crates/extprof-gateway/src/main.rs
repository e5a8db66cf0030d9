mod config;
mod controller;
mod demo;
mod extension;
mod service;

use anyhow::Result;
use config::Config;
use service::ProfilerService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Create and run the profiler host
    let service = ProfilerService::new(config);
    service.run().await
}
