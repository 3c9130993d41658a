// ABOUTME: CLI binary for the unfurl metadata extractor.
// ABOUTME: Unfurls URLs or a local HTML file and prints the extracted fields as JSON.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use digests_unfurl::{load_rules_from_path, ExtractionResult, Unfurler};

#[derive(Parser, Debug)]
#[command(name = "unfurl")]
#[command(about = "Extract link metadata from web pages")]
struct Args {
    /// HTML file to extract from (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// URL the HTML file was served from (required with --html)
    #[arg(long = "url")]
    url: Option<String>,

    /// Add a `cleaned_url` field without tracking parameters
    #[arg(long = "clean-url")]
    clean_url: bool,

    /// Print compact JSON instead of pretty-printed
    #[arg(long = "compact")]
    compact: bool,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// Request timeout in seconds
    #[arg(long = "timeout", default_value_t = 15)]
    timeout: u64,

    /// JSON rules file replacing the built-in rule table
    #[arg(long = "rules")]
    rules: Option<PathBuf>,

    /// URLs to unfurl (fetch mode)
    #[arg()]
    urls: Vec<String>,
}

fn format_output(results: &[ExtractionResult], compact: bool) -> serde_json::Result<String> {
    match (results, compact) {
        ([single], true) => serde_json::to_string(single),
        ([single], false) => serde_json::to_string_pretty(single),
        (many, true) => serde_json::to_string(many),
        (many, false) => serde_json::to_string_pretty(many),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.html.is_some() && args.url.is_none() {
        eprintln!("error: --url is required when using --html");
        return ExitCode::from(1);
    }

    if args.html.is_none() && args.urls.is_empty() {
        eprintln!("error: at least one URL is required, or use --html with --url");
        return ExitCode::from(1);
    }

    if args.html.is_some() && !args.urls.is_empty() {
        eprintln!("error: cannot use both --html and positional URLs");
        return ExitCode::from(1);
    }

    let mut builder = Unfurler::builder()
        .timeout(Duration::from_secs(args.timeout))
        .allow_private_networks(args.allow_private_networks);
    if let Some(path) = &args.rules {
        match load_rules_from_path(path) {
            Ok(rules) => builder = builder.rules(Arc::new(rules)),
            Err(e) => {
                eprintln!("error loading rules: {}", e);
                return ExitCode::from(1);
            }
        }
    }
    let unfurler = builder.build();

    let mut results: Vec<ExtractionResult> = Vec::new();
    let mut had_error = false;

    match (&args.html, &args.url) {
        (Some(html_path), Some(url)) => match fs::read_to_string(html_path) {
            Ok(html) => match unfurler.unfurl_html(&html, url) {
                Ok(result) => results.push(result),
                Err(e) => {
                    eprintln!("error extracting HTML: {}", e);
                    had_error = true;
                }
            },
            Err(e) => {
                eprintln!("error reading file {:?}: {}", html_path, e);
                had_error = true;
            }
        },
        _ => {
            for url in &args.urls {
                match unfurler.unfurl(url, args.clean_url).await {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        eprintln!("error unfurling {}: {}", url, e);
                        had_error = true;
                    }
                }
            }
        }
    }

    if !results.is_empty() {
        match format_output(&results, args.compact) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("error serializing results: {}", e);
                had_error = true;
            }
        }
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
