#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    contrast_studio::run().await
}
