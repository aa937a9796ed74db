use skylift::command::CabinCommand;
use skylift::hub::BroadcastHub;
use skylift::protocol::{Envelope, ProtocolHandler, Request};
use skylift::recovery::{spawn_recovery, SharedSimulator};
use skylift::sim::{Simulator, TICK_PERIOD_S};
use skylift::warehouse::Warehouse;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8080;
const NACK_LINE: &str = r#"{"ok":false}"#;

type SharedWarehouse = Arc<Mutex<Warehouse>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("🛗  Space Elevator Cabin Simulator");
    println!("==================================");

    let sim: SharedSimulator = Arc::new(Mutex::new(Simulator::new()));
    let warehouse: SharedWarehouse = Arc::new(Mutex::new(Warehouse::new()));
    let hub = Arc::new(BroadcastHub::new());

    // TCP transport runs beside the tick loop.
    let tcp_sim = Arc::clone(&sim);
    let tcp_warehouse = Arc::clone(&warehouse);
    let tcp_hub = Arc::clone(&hub);
    let _tcp_server = tokio::spawn(async move {
        if let Err(e) = start_tcp_server(tcp_sim, tcp_warehouse, tcp_hub).await {
            error!("TCP server error: {}", e);
        }
    });

    // Fixed-tick simulation loop: advance under the guard, broadcast after
    // releasing it.
    let mut handler = ProtocolHandler::new();
    let mut interval = time::interval(Duration::from_secs_f64(TICK_PERIOD_S));

    loop {
        interval.tick().await;

        let snapshot = {
            let mut sim_guard = sim.lock().await;
            sim_guard.tick()
        };

        match handler.serialize_envelope(&Envelope::Telemetry(snapshot)) {
            Ok(line) => {
                hub.broadcast(line).await;
            }
            Err(e) => {
                // Never fatal to the loop; skip this tick's broadcast.
                error!("telemetry serialization failed: {}", e);
            }
        }
    }
}

async fn start_tcp_server(
    sim: SharedSimulator,
    warehouse: SharedWarehouse,
    hub: Arc<BroadcastHub>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", TCP_PORT)).await?;
    info!("🌐 TCP server listening on port {}", TCP_PORT);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 New client connected: {}", addr);
                let client_sim = Arc::clone(&sim);
                let client_warehouse = Arc::clone(&warehouse);
                let client_hub = Arc::clone(&hub);

                tokio::spawn(async move {
                    if let Err(e) =
                        handle_client(stream, client_sim, client_warehouse, client_hub).await
                    {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    sim: SharedSimulator,
    warehouse: SharedWarehouse,
    hub: Arc<BroadcastHub>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let writer = Arc::new(Mutex::new(writer));

    let mut handler = ProtocolHandler::new();
    let mut observer = hub.register().await;
    let observer_id = observer.id();

    // New observers get the current state immediately, ahead of the next
    // tick's broadcast.
    {
        let sim_guard = sim.lock().await;
        let snapshot = sim_guard.snapshot();
        drop(sim_guard);
        let line = handler.serialize_envelope(&Envelope::Telemetry(snapshot))?;
        write_line(&writer, line).await?;
    }

    // Drain this observer's queue onto the socket; a slow socket stalls
    // only this task, and the hub prunes the observer once its queue fills.
    let observer_writer = Arc::clone(&writer);
    let observer_task = tokio::spawn(async move {
        while let Some(message) = observer.recv().await {
            if let Err(e) = write_line(&observer_writer, &message).await {
                warn!("Failed to forward snapshot: {}", e);
                break;
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break, // Client disconnected
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match handler.parse_request(trimmed) {
                    Ok(request) => {
                        let reply =
                            serve_request(request, &sim, &warehouse, &hub, &mut handler).await;
                        write_line(&writer, &reply).await?;
                    }
                    Err(e) => {
                        error!("Failed to parse request: {}", e);
                        write_line(&writer, NACK_LINE).await?;
                    }
                }
            }
            Err(e) => {
                error!("Error reading from client: {}", e);
                break;
            }
        }
    }

    hub.unregister(observer_id).await;
    observer_task.abort();
    Ok(())
}

/// Applies one request and returns the serialized reply line.
///
/// Serialization failures never tear down the connection: the broadcast is
/// skipped and the client still gets a reply, the same way the tick loop
/// skips a snapshot it cannot serialize.
async fn serve_request(
    request: Request,
    sim: &SharedSimulator,
    warehouse: &SharedWarehouse,
    hub: &BroadcastHub,
    handler: &mut ProtocolHandler,
) -> String {
    match request {
        Request::Command(command_request) => {
            let command = command_request.into_command();
            info!("📨 Received command: {:?}", command);

            // Only a load touches the warehouse; every other command
            // contends on the simulator guard alone.
            let outcome = if matches!(command, CabinCommand::LoadFromWarehouse) {
                let mut warehouse_guard = warehouse.lock().await;
                let mut sim_guard = sim.lock().await;
                sim_guard.apply(&command, Some(&mut *warehouse_guard))
            } else {
                let mut sim_guard = sim.lock().await;
                sim_guard.apply(&command, None)
            };

            if let Some(ticket) = outcome.recovery {
                spawn_recovery(Arc::clone(sim), ticket);
            }

            ack_line(handler)
        }
        Request::AddParcel(parcel) => {
            let snapshot = {
                let mut warehouse_guard = warehouse.lock().await;
                if let Err(e) = warehouse_guard.insert_new(parcel) {
                    warn!("parcel dropped: {}", e);
                }
                warehouse_guard.snapshot()
            };

            match handler.serialize_envelope(&Envelope::Parcels(snapshot)) {
                Ok(envelope) => {
                    hub.broadcast(envelope).await;
                }
                Err(e) => error!("parcels serialization failed: {}", e),
            }
            ack_line(handler)
        }
        Request::Status => {
            let snapshot = {
                let sim_guard = sim.lock().await;
                sim_guard.snapshot()
            };
            match handler.serialize_envelope(&Envelope::Telemetry(snapshot)) {
                Ok(line) => line.to_owned(),
                Err(e) => {
                    error!("telemetry serialization failed: {}", e);
                    NACK_LINE.to_owned()
                }
            }
        }
        Request::Parcels => {
            let snapshot = {
                let warehouse_guard = warehouse.lock().await;
                warehouse_guard.snapshot()
            };
            match handler.serialize_envelope(&Envelope::Parcels(snapshot)) {
                Ok(line) => line.to_owned(),
                Err(e) => {
                    error!("parcels serialization failed: {}", e);
                    NACK_LINE.to_owned()
                }
            }
        }
    }
}

fn ack_line(handler: &mut ProtocolHandler) -> String {
    match handler.serialize_ack() {
        Ok(line) => line.to_owned(),
        Err(_) => NACK_LINE.to_owned(),
    }
}

async fn write_line(writer: &Arc<Mutex<OwnedWriteHalf>>, line: &str) -> std::io::Result<()> {
    let mut writer_guard = writer.lock().await;
    writer_guard.write_all(line.as_bytes()).await?;
    writer_guard.write_all(b"\n").await
}
