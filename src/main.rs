#[tokio::main]
async fn main() {
    if let Err(err) = borrowing_power::api::cli::run().await {
        eprintln!("borrowing-power: {err}");
        std::process::exit(1);
    }
}
