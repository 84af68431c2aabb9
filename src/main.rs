use std::env;

#[tokio::main]
async fn main() {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("serve") => {
            let port = args
                .next()
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(8080);
            if let Err(e) = nestegg::api::run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("Usage: cargo run -- serve [port]");
            std::process::exit(1);
        }
    }
}
