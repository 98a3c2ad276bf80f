//! # Connections
//!
//! The resolver only borrows transports; owning and reusing them is the job of a
//! [`ConnectionFactory`]. [`ChannelFactory`] is the default one: it dials each target once and
//! hands out clones of the cached [`Channel`] afterwards.
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// Hands out a transport for a target address.
pub trait ConnectionFactory {
    type Connection;
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_connection(
        &self,
        target: &str,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>>;
}

impl<T: ConnectionFactory + ?Sized> ConnectionFactory for &T {
    type Connection = T::Connection;
    type Error = T::Error;

    fn get_connection(
        &self,
        target: &str,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> {
        (**self).get_connection(target)
    }
}

/// Dials targets with `tonic` and keeps one [`Channel`] per target.
#[derive(Debug, Default)]
pub struct ChannelFactory {
    channels: Mutex<HashMap<String, Channel>>,
}

impl ChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionFactory for ChannelFactory {
    type Connection = Channel;
    type Error = ClientConnectError;

    async fn get_connection(&self, target: &str) -> Result<Channel, ClientConnectError> {
        let mut channels = self.channels.lock().await;

        if let Some(channel) = channels.get(target) {
            return Ok(channel.clone());
        }

        let endpoint = Endpoint::new(target.to_string())
            .map_err(|e| ClientConnectError::InvalidUrl(target.to_string(), e))?;

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ClientConnectError::ConnectionFailed(target.to_string(), e))?;

        debug!(endpoint = %target, "connected");
        channels.insert(target.to_string(), channel.clone());

        Ok(channel)
    }
}
