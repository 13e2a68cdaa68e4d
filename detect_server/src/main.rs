use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use common::types::{BoundingBox, Detection};
use env_logger::TimestampPrecision;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use detect_server::{
    detector::{Detector, RemoteDetector},
    endpoints::{annotated_stream, healthcheck, index, session_status, start_session, stop_session},
    media::{CaptureSource, MediaSession, StreamConstraints},
    meter::spawn_meter_logger,
    renderer::{load_label_font, FrameRenderer, StreamSurface, Surface},
    sensors::V4lCaptureSource,
    session::SessionController,
    stub::{StubCaptureSource, StubDetector},
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve on
    #[clap(long, default_value = "127.0.0.1:3000")]
    address: String,

    /// Capture device path, or "stub" for a synthetic source
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    /// Detection service URL, or "stub" for canned detections
    #[clap(long, default_value = "stub")]
    detector: String,

    /// Ideal capture width
    #[clap(long, default_value_t = 720)]
    width: u32,

    /// Ideal capture height
    #[clap(long, default_value_t = 480)]
    height: u32,

    /// Target display cadence in frames per second
    #[clap(long, default_value_t = 30)]
    fps: u32,

    /// Label font path; well-known system locations are probed by default
    #[clap(long)]
    font: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let font = load_label_font(args.font.as_deref())?;
    let surface = Arc::new(StreamSurface::new());
    let renderer = Arc::new(FrameRenderer::new(
        font,
        Arc::clone(&surface) as Arc<dyn Surface>,
    ));

    let source: Arc<dyn CaptureSource> = match args.device.as_str() {
        "stub" => Arc::new(StubCaptureSource::new()),
        device => Arc::new(V4lCaptureSource::new(device)),
    };

    let detector: Arc<dyn Detector> = match args.detector.as_str() {
        "stub" => Arc::new(StubDetector::new(vec![Detection::new(
            "stub",
            0.5,
            BoundingBox {
                x: 20.0,
                y: 20.0,
                width: 120.0,
                height: 90.0,
            },
        )])),
        endpoint => Arc::new(RemoteDetector::new(endpoint)),
    };

    let constraints = StreamConstraints {
        ideal_width: args.width,
        ideal_height: args.height,
    };
    let cadence = Duration::from_secs(1) / args.fps.max(1);
    let controller = Arc::new(SessionController::new(
        MediaSession::new(source),
        detector,
        renderer,
        constraints,
        cadence,
    ));

    spawn_meter_logger();

    // Build HTTP server with endpoints
    let app = Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/status", get(session_status))
        .route("/start", post(start_session))
        .route("/stop", post(stop_session))
        .route("/stream", get(annotated_stream))
        .layer(Extension(controller))
        .layer(Extension(surface));

    // Serve HTTP server
    let addr: SocketAddr = args.address.parse()?;
    log::info!("serving on http://{addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
