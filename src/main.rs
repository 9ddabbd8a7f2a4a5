use sessionward::api;
use sessionward::logger::*;
use sessionward::server::*;
use sessionward::settings::*;
use std::fs;
use std::sync::Arc;
use tokio::signal;
use warp::Filter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(
        address = %project_settings.http.address,
        tls = project_settings.http.tls,
        "settings loaded"
    );
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let address: std::net::SocketAddr = project_settings.http.address.parse()?;

    let server = Arc::new(Server::try_new(&project_settings).await?);

    let api_v1 = api::service(server.clone()).with(warp::trace::request());

    let shutdown_signal = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("could not register SIGINT handler: {}", e);
        }
    };

    if project_settings.http.tls {
        let cert_path = tls_file(project_settings.http.cert_path.as_deref(), "cert")?;
        let key_path = tls_file(project_settings.http.key_path.as_deref(), "key")?;

        warp::serve(api_v1)
            .tls()
            .cert_path(cert_path)
            .key_path(key_path)
            .bind_with_graceful_shutdown(address, shutdown_signal)
            .1
            .await;
    } else {
        warn!("serving without TLS");
        let (_, serving) = warp::serve(api_v1).try_bind_with_graceful_shutdown(address, shutdown_signal)?;
        serving.await;
    }

    let shutdown_timeout = std::time::Duration::from_secs(30);
    match tokio::time::timeout(shutdown_timeout, server.shutdown()).await {
        Ok(_) => info!("server shutdown successfully"),
        Err(_) => error!("server shutdown timed out"),
    }

    Ok(())
}

fn tls_file(path: Option<&str>, what: &str) -> anyhow::Result<String> {
    let path = path.ok_or_else(|| anyhow::anyhow!("http.{what}_path is required with tls"))?;
    if !fs::metadata(path)?.is_file() {
        return Err(anyhow::anyhow!("TLS {what} is not a regular file: {:?}", path));
    }
    Ok(path.to_string())
}
