use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = hopgate::cli::Cli::parse();
    if let Err(e) = hopgate::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
