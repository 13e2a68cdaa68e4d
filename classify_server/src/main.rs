use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use common::types::Classification;
use env_logger::TimestampPrecision;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use classify_server::{
    classifier::{Classifier, RemoteClassifier, StubClassifier},
    endpoints::{classify_upload, healthcheck, index},
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve on
    #[clap(long, default_value = "127.0.0.1:3100")]
    address: String,

    /// Classification service URL, or "stub" for canned results
    #[clap(long, default_value = "stub")]
    classifier: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let classifier: Arc<dyn Classifier> = match args.classifier.as_str() {
        "stub" => Arc::new(StubClassifier::new(vec![Classification {
            label: "stub".to_string(),
            confidence: 0.5,
        }])),
        endpoint => Arc::new(RemoteClassifier::new(endpoint)),
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/classify", post(classify_upload))
        .layer(Extension(classifier));

    let addr: SocketAddr = args.address.parse()?;
    log::info!("serving on http://{addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
