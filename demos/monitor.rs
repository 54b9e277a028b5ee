use salus_it500::{MessageLogMode, SalusClient};
use std::env;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> salus_it500::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let usage = "usage: monitor <email> <password> <device-id> [--log <path>] [--base-url <url>]";
    let (Some(user), Some(pass), Some(device)) = (args.get(1), args.get(2), args.get(3)) else {
        eprintln!("{usage}");
        std::process::exit(2);
    };
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
    };

    let mut builder = SalusClient::builder(user, pass, device).timeout(Duration::from_secs(20));
    if let Some(path) = flag("--log") {
        builder = builder.message_log(MessageLogMode::Diffed, path);
    }
    if let Some(url) = flag("--base-url") {
        builder = builder.base_url(url);
    }
    let client = builder.build()?;

    println!("Polling {} ({device}) every {}s...", client.name(), POLL_INTERVAL.as_secs());
    loop {
        match client.refresh().await {
            Ok(state) => println!("{state}"),
            // Stale state stays readable; the next poll tries again.
            Err(e) => eprintln!("Refresh error: {e} (last known: {})", client.state()),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
