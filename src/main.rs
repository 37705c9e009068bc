#[tokio::main]
async fn main() -> anyhow::Result<()> {
    botgpt_lib::run().await
}
