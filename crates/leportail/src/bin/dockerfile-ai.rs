// dockerfile-ai binary entry point

use leportail::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::main().await {
        eprintln!("{}", cli::report_error(&e));
        std::process::exit(1);
    }
}
