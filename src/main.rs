use anyhow::Result;
use peephole::application::telemetry::init_tracing;
use peephole::config::Settings;
use peephole::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.logging);

    let app = Application::from_settings(settings).await?;
    app.run().await?;

    Ok(())
}
