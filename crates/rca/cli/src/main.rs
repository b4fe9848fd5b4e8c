#[tokio::main]
async fn main() {
    if let Err(error) = rca_cli::run().await {
        rca_cli::print_error(&error.to_string());
        std::process::exit(1);
    }
}
