#[tokio::main]
async fn main() -> anyhow::Result<()> {
    adscope_replay::run().await
}
