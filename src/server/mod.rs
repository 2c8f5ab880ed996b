pub mod api;

use crate::agent::ConciergeAgent;
use crate::cli::Args;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::Router;
use log::{ info, warn };

pub struct Server {
    agent: Arc<ConciergeAgent>,
    args: Args,
}

impl Server {
    pub fn new(agent: Arc<ConciergeAgent>, args: Args) -> Self {
        Self { agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.args.server_addr.parse::<SocketAddr>()?;
        let app = api::router(self.agent.clone(), self.args.rate_limit_per_second);

        match tls_paths(&self.args)? {
            Some((cert_path, key_path)) => serve_tls(addr, app, cert_path, key_path).await,
            None => serve_plain(addr, app).await,
        }
    }
}

fn tls_paths(args: &Args) -> Result<Option<(&str, &str)>, Box<dyn Error + Send + Sync>> {
    if !args.enable_tls {
        if args.tls_cert_path.is_some() || args.tls_key_path.is_some() {
            warn!("TLS paths given but --enable-tls is off; serving plain HTTP");
        }
        return Ok(None);
    }
    match (&args.tls_cert_path, &args.tls_key_path) {
        (Some(cert), Some(key)) => Ok(Some((cert.as_str(), key.as_str()))),
        (Some(_), None) | (None, Some(_)) => {
            Err("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".into())
        }
        (None, None) => Err("TLS enabled without cert/key".into()),
    }
}

async fn serve_tls(
    addr: SocketAddr,
    app: Router,
    cert_path: &str,
    key_path: &str
) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
    let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;

    info!("Concierge API listening on: https://{}", addr);
    axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    Ok(())
}

async fn serve_plain(addr: SocketAddr, app: Router) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = tokio::net::TcpListener
        ::bind(addr).await
        .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e))?;

    info!("Concierge API listening on: http://{}", addr);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["clinic-concierge"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn plain_http_when_tls_is_off() {
        let args = parse(&["--tls-cert-path", "cert.pem"]);
        assert!(tls_paths(&args).unwrap().is_none());
    }

    #[test]
    fn tls_uses_both_paths() {
        let args = parse(&["--enable-tls", "--tls-cert-path", "cert.pem", "--tls-key-path", "key.pem"]);
        assert_eq!(tls_paths(&args).unwrap(), Some(("cert.pem", "key.pem")));
    }

    #[test]
    fn tls_with_one_path_is_rejected() {
        let cert_only = parse(&["--enable-tls", "--tls-cert-path", "cert.pem"]);
        let err = tls_paths(&cert_only).unwrap_err();
        assert!(err.to_string().contains("Both --tls-cert-path and --tls-key-path"));

        let key_only = parse(&["--enable-tls", "--tls-key-path", "key.pem"]);
        assert!(tls_paths(&key_only).is_err());
    }

    #[test]
    fn tls_without_paths_is_rejected() {
        let args = parse(&["--enable-tls"]);
        assert_eq!(tls_paths(&args).unwrap_err().to_string(), "TLS enabled without cert/key");
    }
}
