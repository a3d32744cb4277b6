// src/main.rs
use clap::Parser;
use pacproxy::log::{self, LogLevel};
use pacproxy::{ProxyResolver, ResolverConfig};
use std::process::ExitCode;

/// Print the proxies a PAC script chooses for each URL.
#[derive(Debug, Parser)]
#[command(name = "pacproxy", version)]
struct Cli {
    /// PAC script location: http(s) URL, file:// URL or path. Defaults to $PAC_URL.
    #[arg(long)]
    pac: Option<String>,

    /// Proxy user injected into PROXY/SOCKS results.
    #[arg(long)]
    user: Option<String>,

    /// Proxy password injected into PROXY/SOCKS results.
    #[arg(long)]
    password: Option<String>,

    /// error, warn, info or debug. RUST_LOG overrides this.
    #[arg(long, default_value = "warn")]
    log_level: LogLevel,

    /// URLs to resolve.
    #[arg(required = true)]
    urls: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    log::init(cli.log_level);

    let mut config = ResolverConfig::from_env();
    if let Some(pac) = cli.pac {
        config.pac_url = Some(pac);
    }
    if let Some(user) = cli.user {
        config.credentials.user = user;
    }
    if let Some(password) = cli.password {
        config.credentials.password = password;
    }

    let pac_url = config.pac_url.take();
    let resolver = ProxyResolver::from_config(&config);

    let mut status = ExitCode::SUCCESS;
    if let Some(pac_url) = pac_url {
        if let Err(e) = resolver.configure_from_url(&pac_url) {
            eprintln!("Error: {}", e);
            status = ExitCode::FAILURE;
        }
    }

    for url in &cli.urls {
        let proxies: Vec<String> = resolver
            .resolve_url(url)
            .iter()
            .map(|p| p.to_string())
            .collect();
        println!("Proxy for {} → {}", url, proxies.join("; "));
    }
    status
}
