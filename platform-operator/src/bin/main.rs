use std::sync::Arc;

use platform_helm::HelmClient;
use platform_operator::config::{CliArgs, OperatorConfig, RequeueIntervals};
use platform_operator::controller::{self, ControllerContext};
use platform_operator::webhook;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = CliArgs::args();
    init_logging(&args.log_level);
    OperatorConfig::initialize(args);
    let config = OperatorConfig::get();

    info!(
        metrics_addr = config.metrics_addr(),
        webhook_port = config.webhook_port(),
        sync_period_secs = config.sync_period().as_secs(),
        "starting observability platform operator"
    );

    let k8s = match kube::Client::try_default().await {
        Ok(client) => client,
        Err(source) => {
            error!(%source, "failed to construct kubernetes client");
            std::process::exit(1);
        }
    };

    let helm = match HelmClient::new() {
        Ok(client) => client,
        Err(source) => {
            error!(%source, "failed to initialize helm client");
            std::process::exit(1);
        }
    };

    let requeue = RequeueIntervals::from_sync_period(config.sync_period());
    let ctx = Arc::new(ControllerContext {
        k8s,
        helm: Arc::new(helm),
        requeue,
    });

    let webhook_addr = format!("0.0.0.0:{}", config.webhook_port());
    let metrics_addr = config.metrics_addr().to_string();
    let health_addr = config.health_addr().to_string();

    tokio::select! {
        () = controller::run(ctx) => {}
        result = webhook::serve(&webhook_addr) => {
            if let Err(source) = result {
                error!(%source, "webhook server exited");
                std::process::exit(1);
            }
        }
        result = serve_metrics(&metrics_addr) => {
            if let Err(source) = result {
                error!(%source, "metrics server exited");
                std::process::exit(1);
            }
        }
        result = serve_health(&health_addr) => {
            if let Err(source) = result {
                error!(%source, "health server exited");
                std::process::exit(1);
            }
        }
    }
}

async fn serve_metrics(addr: &str) -> std::io::Result<()> {
    use actix_web::{get, App, HttpResponse, HttpServer, Responder};

    #[get("/metrics")]
    async fn metrics() -> impl Responder {
        HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(platform_operator::metrics::encode())
    }

    HttpServer::new(|| App::new().service(metrics)).bind(addr)?.run().await
}

async fn serve_health(addr: &str) -> std::io::Result<()> {
    use actix_web::{get, App, HttpResponse, HttpServer, Responder};

    #[get("/healthz")]
    async fn healthz() -> impl Responder {
        HttpResponse::Ok().finish()
    }

    HttpServer::new(|| App::new().service(healthz)).bind(addr)?.run().await
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
