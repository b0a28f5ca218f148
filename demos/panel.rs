//! Panel side - attaches to the engine's channel and pushes settings.
//!
//! Stands in for the configuration GUI: applies a settings page as one
//! composite batch, queries the engine version, and says goodbye.
//!
//! Accepts `--link-channel NAME`; defaults to the engine demo's fixed
//! name.

use std::time::Duration;

use scenelink::codec::Value;
use scenelink::transport::Channel;
use scenelink::{Dispatcher, Link};

mod ids {
    pub const SET_SHADOW_STRENGTH: u16 = 0;
    pub const SET_CAMERA_NAME: u16 = 1;
    pub const ENABLE_HAND_TRACKING: u16 = 2;
    pub const RESET_POSE: u16 = 3;
    pub const QUERY_VERSION: u16 = 4;
    pub const COUNT: u16 = 5;
}

#[tokio::main]
async fn main() -> Result<(), scenelink::LinkError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut dispatcher = Dispatcher::new(ids::COUNT);
    dispatcher.on_command(ids::RESET_POSE, |_| {
        tracing::info!("engine reset its pose");
    });

    let channel = Channel::from_args(std::env::args())
        .unwrap_or_else(|| Channel::named("scenelink-demo"));

    let link = Link::builder(channel, dispatcher.inbox())
        .query_timeout(Duration::from_secs(5))
        .connect()
        .await?;
    tracing::info!("attached to engine");

    let version = link.query(ids::QUERY_VERSION, &Value::None).await;
    tracing::info!(version, "engine reported its version");

    // Apply a whole settings page as one transport write. The slider
    // moved twice before the page was applied; only the last value goes
    // out.
    link.begin_composite();
    link.send(ids::SET_SHADOW_STRENGTH, &Value::from_percent(40.0));
    link.send(ids::SET_CAMERA_NAME, &Value::Str("front".to_string()));
    link.send(ids::ENABLE_HAND_TRACKING, &Value::Bool(true));
    link.send(ids::SET_SHADOW_STRENGTH, &Value::from_percent(65.0));
    link.end_composite();

    link.send(ids::RESET_POSE, &Value::None);

    // Let the panel's own handlers run while the frames land.
    for _ in 0..30 {
        dispatcher.tick();
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    link.close();
    tracing::info!("done");
    Ok(())
}
