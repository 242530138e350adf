//! Channel builder and configuration.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use super::handler::{HandlerResult, InboundMessage, MessageHandler};
use super::{Channel, Inner};
use crate::codec::WireCodec;
use crate::correlation::{IdGenerator, RequestStore, UuidGenerator};
use crate::error::Result;
use crate::progress::{ProgressCleanup, ProgressRegistry};
use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;
use crate::responder::{ProgressLayer, Responder, ResponderChain, ResponderLayer};
use crate::router::Router;
use crate::transport::{spawn_stream_transport, Outbound, StreamTransportConfig, Transport};

/// Channel settings.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Codec for every frame.
    pub codec: WireCodec,
    /// Whether requests may complete through [`PendingResponse`].
    ///
    /// [`PendingResponse`]: crate::correlation::PendingResponse
    pub async_results: bool,
    /// Whether progress updates are supported.
    pub progress_updates: bool,
    /// Timeout for requests that do not set their own.
    pub default_timeout: Option<Duration>,
    /// Largest frame accepted by the read loop, and by the stream
    /// transport of [`ChannelBuilder::connect`] on the way out.
    pub max_message_size: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            codec: WireCodec::Json,
            async_results: true,
            progress_updates: true,
            default_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Builder for configuring and creating a [`Channel`].
pub struct ChannelBuilder {
    config: ChannelConfig,
    ids: Arc<dyn IdGenerator>,
    layers: Vec<Arc<dyn ResponderLayer>>,
    handler: Option<Arc<dyn MessageHandler>>,
    router: Option<Router>,
    stream_config: StreamTransportConfig,
}

impl ChannelBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ChannelConfig::default(),
            ids: Arc::new(UuidGenerator),
            layers: Vec::new(),
            handler: None,
            router: None,
            stream_config: StreamTransportConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the wire codec.
    ///
    /// Default: JSON
    pub fn codec(mut self, codec: WireCodec) -> Self {
        self.config.codec = codec;
        self
    }

    /// Allow or forbid awaitable requests.
    ///
    /// When forbidden, [`RequestBuilder::send`] fails and only callback
    /// requests work. Default: allowed
    ///
    /// [`RequestBuilder::send`]: super::RequestBuilder::send
    pub fn async_results(mut self, enabled: bool) -> Self {
        self.config.async_results = enabled;
        self
    }

    /// Turn progress support on or off.
    ///
    /// Default: on
    pub fn progress_updates(mut self, enabled: bool) -> Self {
        self.config.progress_updates = enabled;
        self
    }

    /// Timeout applied to requests that do not set one.
    ///
    /// `Duration::ZERO` means no timeout.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    /// Largest frame accepted by [`Channel::run`].
    ///
    /// Channels created with [`connect`](Self::connect) also refuse to send
    /// larger messages. Default: 16 MB
    pub fn max_message_size(mut self, size: u32) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Outbound queue capacity used by [`connect`](Self::connect).
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.stream_config.channel_capacity = capacity;
        self
    }

    /// Set the correlation id generator.
    ///
    /// Default: UUID v4
    pub fn id_generator<G: IdGenerator>(mut self, generator: G) -> Self {
        self.ids = Arc::new(generator);
        self
    }

    /// Add a responder layer. Layers run in the order they are added,
    /// before the progress layer.
    pub fn layer<L: ResponderLayer>(mut self, layer: L) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    /// Set the handler for inbound requests and plain messages.
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(InboundMessage, Responder) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Route `{ _m, _u, _b }` messages through `router`.
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Build a channel sending through `transport`.
    ///
    /// Inbound messages are fed with [`Channel::handle_frame`],
    /// [`Channel::handle_message`] or [`Channel::run`].
    pub fn build<T: Transport>(self, transport: T) -> Channel {
        let registry = Arc::new(ProgressRegistry::new());
        let store = Arc::new(ProgressCleanup::new(RequestStore::new(), registry.clone()));

        let mut responders = ResponderChain::new();
        for layer in self.layers {
            responders.push(layer);
        }
        if self.config.progress_updates {
            responders.push(Arc::new(ProgressLayer));
        }

        let outbound = Outbound::new(Arc::new(transport), self.config.codec);

        Channel {
            inner: Arc::new(Inner {
                config: self.config,
                outbound,
                registry,
                store,
                ids: self.ids,
                responders,
                handler: self.handler,
                router: self.router,
            }),
        }
    }

    /// Build a channel over a byte stream.
    ///
    /// Spawns a writer task for the write half and a read loop for the
    /// read half. The returned handle resolves when the read loop ends.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect<S>(self, stream: S) -> (Channel, JoinHandle<Result<()>>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let stream_config = StreamTransportConfig {
            max_message_size: self.config.max_message_size,
            ..self.stream_config.clone()
        };
        let (transport, _writer_task) = spawn_stream_transport(writer, stream_config);
        let channel = self.build(transport);

        let read_channel = channel.clone();
        let read_loop = tokio::spawn(async move { read_channel.run(reader).await });

        (channel, read_loop)
    }
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::SequentialIdGenerator;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.codec, WireCodec::Json);
        assert!(config.async_results);
        assert!(config.progress_updates);
        assert_eq!(config.default_timeout, None);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_builder_configuration() {
        let channel = Channel::builder()
            .codec(WireCodec::MsgPack)
            .async_results(false)
            .progress_updates(false)
            .default_timeout(Duration::from_secs(3))
            .max_message_size(1024)
            .id_generator(SequentialIdGenerator::new("t-"))
            .build(MemoryTransport::new());

        let config = channel.config();
        assert_eq!(config.codec, WireCodec::MsgPack);
        assert!(!config.async_results);
        assert!(!config.progress_updates);
        assert_eq!(config.default_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.max_message_size, 1024);
    }

    #[test]
    fn test_progress_layer_is_last() {
        let channel = Channel::builder()
            .layer(|r: Responder| r)
            .build(MemoryTransport::new());
        assert_eq!(channel.inner.responders.len(), 2);

        let without = Channel::builder()
            .progress_updates(false)
            .build(MemoryTransport::new());
        assert!(without.inner.responders.is_empty());
    }
}
