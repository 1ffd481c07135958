use clap::Parser;
use mcp_client::{ClientConfig, HttpForwarder};
use mcp_proxy::{Bridge, BridgeConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mcp-bridge",
    about = "MCP stdio bridge - forward a local MCP client's requests to a remote HTTP endpoint",
    version = env!("CARGO_PKG_VERSION")
)]
struct Args {
    /// Remote MCP endpoint URL
    #[arg(value_name = "URL", env = "MCP_BRIDGE_URL")]
    server_url: Option<String>,

    /// Bearer token sent with every forwarded request
    #[arg(long, env = "MCP_BRIDGE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Custom HTTP headers (format: key:value)
    #[arg(long = "header", value_name = "KEY:VALUE")]
    headers: Vec<String>,

    /// Per-request deadline in seconds
    #[arg(
        long,
        env = "MCP_BRIDGE_TIMEOUT",
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Seconds to wait for in-flight requests once stdin closes
    #[arg(long, default_value = "5")]
    drain_timeout: u64,

    /// Allow HTTP connections (default is HTTPS only)
    #[arg(long)]
    allow_http: bool,

    /// Enable debug logging
    #[arg(long, short)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the protocol; every diagnostic goes to stderr.
    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let (client_config, bridge_config) = build_config(&args)?;
    let forwarder = HttpForwarder::new(client_config)
        .map_err(|e| anyhow::anyhow!("Failed to set up forwarder: {}", e))?;

    info!("MCP bridge starting");
    info!("Server URL: {}", forwarder.endpoint());
    if !args.headers.is_empty() {
        info!("Custom headers: {:?}", header_names(&args.headers));
    }

    let bridge = Bridge::new(Arc::new(forwarder), bridge_config);

    tokio::select! {
        result = bridge.run_stdio() => {
            if let Err(e) = result {
                error!("Bridge error: {}", e);
                return Err(anyhow::anyhow!("Bridge failed: {}", e));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal, shutting down");
            // The blocking stdin read would keep the runtime alive.
            std::process::exit(0);
        }
    }

    info!("MCP bridge stopped");
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<(ClientConfig, BridgeConfig)> {
    let server_url = args.server_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!("No remote endpoint configured. Pass a URL or set MCP_BRIDGE_URL")
    })?;

    let mut config = ClientConfig::new(server_url).with_timeout(Duration::from_secs(args.timeout));
    if args.allow_http {
        config = config.allow_http();
    }
    if let Some(token) = args.token.as_deref().filter(|t| !t.is_empty()) {
        config = config.with_auth_token(token);
    }
    for header in &args.headers {
        let (key, value) = parse_header(header)?;
        config = config.with_header(key, value);
    }

    config.endpoint().map_err(|e| anyhow::anyhow!("{}", e))?;

    let bridge_config =
        BridgeConfig::default().with_drain_timeout(Duration::from_secs(args.drain_timeout));

    Ok((config, bridge_config))
}

fn parse_header(header: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = header
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid header '{}': expected KEY:VALUE", header))?;

    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Invalid header '{}': empty name", header);
    }

    Ok((key.to_string(), value.trim().to_string()))
}

fn header_names(headers: &[String]) -> Vec<&str> {
    headers
        .iter()
        .filter_map(|h| h.split_once(':').map(|(key, _)| key.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("mcp-bridge").chain(argv.iter().copied()))
            .expect("args")
    }

    #[test]
    fn test_build_config_https() {
        let (config, bridge) = build_config(&args(&[
            "https://example.com/mcp",
            "--token",
            "abc",
            "--header",
            "X-Tenant: docs",
            "--timeout",
            "10",
        ]))
        .unwrap();

        assert_eq!(config.server_url, "https://example.com/mcp");
        assert_eq!(config.auth_token.as_deref(), Some("abc"));
        assert_eq!(config.headers.get("X-Tenant"), Some(&"docs".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(bridge.drain_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_build_config_http_disallowed() {
        assert!(build_config(&args(&["http://example.com/mcp"])).is_err());
        assert!(build_config(&args(&["http://example.com/mcp", "--allow-http"])).is_ok());
    }

    #[test]
    fn test_build_config_invalid_url() {
        assert!(build_config(&args(&["invalid-url"])).is_err());
        assert!(build_config(&args(&["ftp://example.com"])).is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = Args::try_parse_from(["mcp-bridge", "https://example.com/mcp", "--timeout", "0"]);
        assert!(result.is_err());
        assert_eq!(args(&["https://example.com/mcp", "--timeout", "1"]).timeout, 1);
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization: Bearer x:y").unwrap(),
            ("Authorization".to_string(), "Bearer x:y".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(":value").is_err());
    }

    #[test]
    fn test_header_names_hide_values() {
        let headers = vec!["X-Api-Key: secret".to_string()];
        assert_eq!(header_names(&headers), vec!["X-Api-Key"]);
    }
}
