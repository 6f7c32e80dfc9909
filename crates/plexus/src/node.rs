//! A dispatcher, its clock and its bridge, wired together and served over
//! WebSocket.

use std::future::Future;
use std::sync::Arc;

use plexus_clock::ClockPump;
use plexus_dispatch::{Dispatcher, ReceiverDirectory, ShutdownReport};
use plexus_transport::{Connection, Transport, TransportError, WebSocketConnection, WebSocketTransport};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bridge::NetBridge;
use crate::codec::PayloadCodecs;
use crate::config::PlexusConfig;
use crate::link::{drive_link, LinkStats};
use crate::PlexusError;

/// A running Plexus endpoint.
///
/// Construction wires the [`NetBridge`] in as the dispatcher's propagator
/// and the [`ClockPump`]'s clock in as its clock.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), plexus::PlexusError> {
/// use plexus::prelude::*;
///
/// let config = PlexusConfig::load("plexus.json")?;
/// init_tracing(&config.log_filter);
/// let node = PlexusNode::new(config, PayloadCodecs::new());
/// node.serve().await
/// # }
/// ```
pub struct PlexusNode {
    config: PlexusConfig,
    dispatcher: Arc<Dispatcher>,
    bridge: Arc<NetBridge>,
    pump: ClockPump,
}

impl PlexusNode {
    pub fn new(config: PlexusConfig, codecs: PayloadCodecs) -> Self {
        let config = config.validated();
        let pump = ClockPump::new(config.clock.clone());
        let dispatcher = Arc::new(Dispatcher::with_config(config.dispatch.clone(), pump.clock()));
        let directory = Arc::new(ReceiverDirectory::new());
        let bridge = Arc::new(NetBridge::new(config.bridge.clone(), codecs, directory));
        dispatcher.set_propagator(bridge.clone());

        Self {
            config,
            dispatcher,
            bridge,
            pump,
        }
    }

    pub fn config(&self) -> &PlexusConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn bridge(&self) -> &Arc<NetBridge> {
        &self.bridge
    }

    /// Receivers that remote peers may address by key.
    pub fn directory(&self) -> &Arc<ReceiverDirectory> {
        self.bridge.directory()
    }

    pub fn pump_mut(&mut self) -> &mut ClockPump {
        &mut self.pump
    }

    /// Attaches `conn` now and runs its link on a new task.
    ///
    /// The peer is attached before this returns, so messages propagated
    /// right after are not missed.
    pub fn spawn_link<C>(&self, conn: C) -> JoinHandle<Result<LinkStats, PlexusError>>
    where
        C: Connection<Error = TransportError>,
    {
        let outbound = self.bridge.attach_peer(conn.id());
        tokio::spawn(drive_link(
            conn,
            outbound,
            self.bridge.clone(),
            self.dispatcher.clone(),
        ))
    }

    /// Dials a WebSocket peer and links it.
    pub async fn connect(&self, url: &str) -> Result<JoinHandle<Result<LinkStats, PlexusError>>, PlexusError> {
        let conn = WebSocketConnection::connect(url).await?;
        Ok(self.spawn_link(conn))
    }

    /// Binds the configured address and serves until the process ends.
    pub async fn serve(self) -> Result<(), PlexusError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        self.serve_with_shutdown(transport, std::future::pending())
            .await
            .map(|_| ())
    }

    /// Accepts peers on `transport` and pumps the clock until `shutdown`
    /// resolves, then drops pending dispatch work.
    ///
    /// Posted messages are drained on every tick. In event-driven mode
    /// the clock never ticks here and the owner drives time elsewhere.
    pub async fn serve_with_shutdown(
        mut self,
        mut transport: WebSocketTransport,
        shutdown: impl Future<Output = ()>,
    ) -> Result<ShutdownReport, PlexusError> {
        info!(
            addr = ?transport.local_addr().ok(),
            tick_rate_hz = self.pump.tick_rate_hz(),
            "plexus node serving"
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        self.spawn_link(conn);
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                },
                info = self.pump.wait_for_tick() => {
                    self.dispatcher.process_posted();
                    self.pump.pump(&self.dispatcher, &info);
                }
            }
        }

        transport.shutdown().await?;
        Ok(self.shutdown())
    }

    /// Discards pending dispatch work and reports how much there was.
    pub fn shutdown(&self) -> ShutdownReport {
        let report = self.dispatcher.shutdown();
        info!(?report, "plexus node shut down");
        report
    }
}
