//! Engine side - hosts the channel and runs a tick loop.
//!
//! This demo stands in for the rendering process: it creates the
//! channel, prints the argument pair to hand to the GUI process, and
//! applies incoming settings on its main loop. Enabling hand tracking
//! pushes a pose reset back to the panel, showing traffic in both
//! directions.
//!
//! Run with a fixed channel name so the panel demo can find it:
//!
//! ```text
//! cargo run --example engine
//! cargo run --example panel     # in another terminal
//! ```

use std::sync::Arc;
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

    dispatcher.on_command(ids::SET_SHADOW_STRENGTH, |v| {
        tracing::info!(strength = ?v.as_percent(), "shadow strength updated");
    });
    dispatcher.on_command(ids::SET_CAMERA_NAME, |v| {
        tracing::info!(camera = ?v.as_str(), "camera switched");
    });
    dispatcher.on_query(ids::QUERY_VERSION, |_| "2.4.1".to_string());

    let channel = Channel::named("scenelink-demo");
    tracing::info!(args = ?channel.to_args(), "launch the panel with these arguments");

    let link = Arc::new(Link::builder(channel, dispatcher.inbox()).host().await?);
    tracing::info!("panel attached");

    // Turning tracking on invalidates the current pose, so tell the
    // panel about the reset.
    let pose_link = link.clone();
    dispatcher.on_command(ids::ENABLE_HAND_TRACKING, move |v| {
        tracing::info!(enabled = ?v.as_bool(), "hand tracking toggled");
        if v.as_bool() == Some(true) {
            pose_link.send(ids::RESET_POSE, &Value::None);
        }
    });

    // Stand-in for the frame loop: tick at ~60 Hz until the panel leaves.
    while !link.is_closed() {
        dispatcher.tick();
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    tracing::info!("panel disconnected, shutting down");
    Ok(())
}
