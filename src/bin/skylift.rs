use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use std::process::Command;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("skylift")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🛗 Space Elevator Cabin Simulator - operator console")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("📊 Get the current cabin state")
                .long_about("Retrieves one telemetry snapshot: position, speed, payload, doors, run flag, target, and cabin mode"),
        )
        .subcommand(
            SubCommand::with_name("start")
                .about("▶️  Start the cabin toward its target")
                .long_about("Engages the drive; ignored while the doors are open"),
        )
        .subcommand(SubCommand::with_name("stop").about("⏹️  Stop the cabin"))
        .subcommand(
            SubCommand::with_name("estop")
                .about("🛑 Emergency stop")
                .long_about("Halts the cabin and puts it in ERROR; the cabin recovers to IDLE on its own after 1.5 s"),
        )
        .subcommand(
            SubCommand::with_name("doors")
                .about("🚪 Command the cabin doors")
                .arg(
                    Arg::with_name("state")
                        .help("Door state")
                        .required(true)
                        .possible_values(&["open", "close"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("target")
                .about("🎯 Set the destination altitude")
                .arg(
                    Arg::with_name("km")
                        .help("Destination in km (clamped to 0-100)")
                        .required(true)
                        .validator(|v| {
                            v.parse::<f64>()
                                .map(|_| ())
                                .map_err(|_| "Destination must be a number".into())
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("speed")
                .about("⚡ Set the cruising speed setpoint")
                .arg(
                    Arg::with_name("ms")
                        .help("Cruising speed in m/s (clamped to 0-200)")
                        .required(true)
                        .validator(|v| {
                            v.parse::<f64>()
                                .map(|_| ())
                                .map_err(|_| "Speed must be a number".into())
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("load")
                .about("📦 Load the next queued parcel into the cabin"),
        )
        .subcommand(
            SubCommand::with_name("parcel")
                .about("🏷️  Warehouse parcel management")
                .subcommand(
                    SubCommand::with_name("add")
                        .about("Queue a new parcel in the warehouse")
                        .arg(Arg::with_name("id").help("Parcel identifier").required(true))
                        .arg(
                            Arg::with_name("weight")
                                .help("Weight in kg")
                                .required(true)
                                .validator(|v| {
                                    v.parse::<f64>()
                                        .map(|_| ())
                                        .map_err(|_| "Weight must be a number".into())
                                }),
                        )
                        .arg(
                            Arg::with_name("destination")
                                .help("Destination altitude in km")
                                .required(true)
                                .validator(|v| {
                                    v.parse::<f64>()
                                        .map(|_| ())
                                        .map_err(|_| "Destination must be a number".into())
                                }),
                        ),
                )
                .subcommand(SubCommand::with_name("list").about("List the parcel catalog")),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("📈 Monitor the live telemetry stream")
                .long_about("Continuously prints cabin snapshots as the simulator broadcasts them each tick"),
        )
        .subcommand(
            SubCommand::with_name("server")
                .about("🚀 Start the simulator server")
                .arg(
                    Arg::with_name("background")
                        .short("b")
                        .long("background")
                        .help("Run server in background"),
                ),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap();
    let port = matches.value_of("port").unwrap().parse::<u16>()?;
    let format = matches.value_of("format").unwrap();
    let verbose = matches.is_present("verbose");

    if verbose {
        println!("{}", "🛗 SkyLift - Space Elevator Simulator".bright_blue().bold());
        println!("{} {}:{}", "Connecting to".dimmed(), host, port);
    }

    match matches.subcommand() {
        ("status", _) => {
            let reply = send_request(host, port, status_request(), Expect::Telemetry).await?;
            print_telemetry(&reply, format);
        }
        ("start", _) => {
            let reply = send_request(host, port, command_request("start", None), Expect::Ack).await?;
            print_command_result("Cabin", "STARTED", &reply, format);
        }
        ("stop", _) => {
            let reply = send_request(host, port, command_request("stop", None), Expect::Ack).await?;
            print_command_result("Cabin", "STOPPED", &reply, format);
        }
        ("estop", _) => {
            let reply =
                send_request(host, port, command_request("emergency_stop", None), Expect::Ack)
                    .await?;
            print_command_result("Emergency stop", "ENGAGED", &reply, format);
        }
        ("doors", Some(sub_matches)) => {
            let state = if sub_matches.value_of("state").unwrap() == "open" {
                "OPEN"
            } else {
                "CLOSED"
            };
            let payload = serde_json::json!({ "state": state });
            let reply =
                send_request(host, port, command_request("set_doors", Some(payload)), Expect::Ack)
                    .await?;
            print_command_result("Doors", state, &reply, format);
        }
        ("target", Some(sub_matches)) => {
            let km: f64 = sub_matches.value_of("km").unwrap().parse()?;
            let payload = serde_json::json!({ "km": km });
            let reply =
                send_request(host, port, command_request("set_target", Some(payload)), Expect::Ack)
                    .await?;
            print_command_result("Target", &format!("{} km", km), &reply, format);
        }
        ("speed", Some(sub_matches)) => {
            let ms: f64 = sub_matches.value_of("ms").unwrap().parse()?;
            let payload = serde_json::json!({ "ms": ms });
            let reply =
                send_request(host, port, command_request("set_speed", Some(payload)), Expect::Ack)
                    .await?;
            print_command_result("Setpoint", &format!("{} m/s", ms), &reply, format);
        }
        ("load", _) => {
            let reply =
                send_request(host, port, command_request("load_from_warehouse", None), Expect::Ack)
                    .await?;
            print_command_result("Parcel load", "REQUESTED", &reply, format);
        }
        ("parcel", Some(sub_matches)) => {
            handle_parcel_command(sub_matches, host, port, format).await?;
        }
        ("monitor", _) => {
            handle_monitor(host, port, format).await?;
        }
        ("server", Some(sub_matches)) => {
            handle_server(sub_matches, port).await?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Start the simulator server", "skylift server".bright_cyan());
            println!("  {} Send the cabin to 50 km", "skylift target 50".bright_cyan());
            println!("  {} Engage the drive", "skylift start".bright_cyan());
            println!("  {} Watch telemetry", "skylift monitor".bright_cyan());
        }
    }

    Ok(())
}

async fn handle_parcel_command(
    matches: &ArgMatches<'_>,
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match matches.subcommand() {
        ("add", Some(sub_matches)) => {
            let id = sub_matches.value_of("id").unwrap();
            let weight: f64 = sub_matches.value_of("weight").unwrap().parse()?;
            let destination: f64 = sub_matches.value_of("destination").unwrap().parse()?;
            let request = serde_json::json!({
                "type": "add_parcel",
                "data": {
                    "id": id,
                    "weight_kg": weight,
                    "destination_km": destination,
                }
            })
            .to_string();
            let reply = send_request(host, port, request, Expect::Ack).await?;
            print_command_result("Parcel", &format!("\"{}\" queued", id), &reply, format);
        }
        ("list", _) => {
            let request = serde_json::json!({ "type": "parcels" }).to_string();
            let reply = send_request(host, port, request, Expect::Parcels).await?;
            print_parcels(&reply, format);
        }
        _ => {
            println!("{}", "Parcel subcommand required. Use 'skylift parcel --help' for options.".yellow());
        }
    }
    Ok(())
}

async fn handle_monitor(
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "📡 Monitoring cabin telemetry (Press Ctrl+C to stop)...".bright_blue().bold());

    let stream = TcpStream::connect((host, port)).await?;
    let mut lines = BufReader::new(stream).lines();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        match format {
            "json" => println!("{}", line),
            _ => {
                if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&line) {
                    match parsed["type"].as_str() {
                        Some("telemetry") => print_telemetry_line(&parsed["data"]),
                        Some("parcels") => {
                            let count = parsed["data"].as_array().map_or(0, |a| a.len());
                            println!(
                                "{} catalog updated: {} parcels",
                                "📦".bright_yellow(),
                                count.to_string().bright_cyan()
                            );
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(())
}

async fn handle_server(
    matches: &ArgMatches<'_>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let background = matches.is_present("background");

    println!("{}", "🚀 Starting space elevator simulator server...".bright_green().bold());

    let mut cmd = Command::new("cargo");
    cmd.args(&["run", "--bin", "skylift-simulator"]);

    if background {
        cmd.spawn()?;
        println!("{} Server started in background on port {}", "✅".green(), port);
    } else {
        println!("{} Server starting on port {} (Press Ctrl+C to stop)", "🌐".bright_blue(), port);
        cmd.status()?;
    }

    Ok(())
}

// Helper functions

/// Which reply line a request expects. The simulator pushes a telemetry
/// snapshot on connect and keeps broadcasting every tick, so the client
/// filters the incoming lines for the shape it asked for.
#[derive(Clone, Copy, PartialEq)]
enum Expect {
    Ack,
    Telemetry,
    Parcels,
}

fn command_request(action: &str, payload: Option<serde_json::Value>) -> String {
    let mut data = serde_json::json!({ "action": action });
    if let Some(payload) = payload {
        data["payload"] = payload;
    }
    serde_json::json!({ "type": "command", "data": data }).to_string()
}

fn status_request() -> String {
    serde_json::json!({ "type": "status" }).to_string()
}

fn matches_expectation(line: &str, expect: Expect) -> bool {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(line) else {
        return false;
    };
    match expect {
        Expect::Ack => parsed.get("ok").is_some(),
        Expect::Telemetry => parsed["type"] == "telemetry",
        Expect::Parcels => parsed["type"] == "parcels",
    }
}

async fn send_request(
    host: &str,
    port: u16,
    request: String,
    expect: Expect,
) -> Result<String, Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", host, port);
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("{} Failed to connect to simulator at {}", "❌".red(), addr.bright_white());
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Server is not running. Start it with:", "💡".yellow());
                eprintln!("   {}", "skylift server".bright_cyan());
                eprintln!("   or");
                eprintln!("   {}", "cargo run --bin skylift-simulator".bright_cyan());
            } else {
                eprintln!("{} Network error: {}", "🔌".yellow(), e.to_string().bright_red());
            }
            return Err(e.into());
        }
    };

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    match tokio::time::timeout(std::time::Duration::from_secs(5), async {
        writer.write_all(request.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        // Tick broadcasts share the connection; skip anything that is not
        // the reply we asked for.
        while let Some(line) = lines.next_line().await? {
            if matches_expectation(&line, expect) {
                return Ok(line);
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "Server closed connection",
        ))
    })
    .await
    {
        Ok(result) => Ok(result?),
        Err(_) => {
            eprintln!("{} Request timed out after 5 seconds", "⏰".yellow());
            Err("Request timeout".into())
        }
    }
}

fn print_command_result(action: &str, value: &str, reply: &str, format: &str) {
    match format {
        "json" => println!("{}", reply),
        "compact" => println!("{}", "OK".bright_green()),
        _ => {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(reply) {
                if parsed["ok"] == true {
                    println!("{} {} {}", "✅".green(), action.bright_white(), value.bright_cyan());
                } else {
                    println!("{} {} request was not accepted", "❌".red(), action.bright_white());
                }
            } else {
                println!("{} {}", "✅".green(), "Command completed".bright_green());
            }
        }
    }
}

fn print_telemetry(reply: &str, format: &str) {
    match format {
        "json" => println!("{}", reply),
        "compact" => {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(reply) {
                let data = &parsed["data"];
                println!(
                    "{} km @ {} m/s [{}]",
                    data["position_km"], data["speed_ms"], data["cabin"]
                );
            }
        }
        _ => {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(reply) {
                println!("{} {}", "📊".bright_blue(), "Cabin Status".bright_blue().bold());
                print_telemetry_line(&parsed["data"]);
            }
        }
    }
}

fn print_telemetry_line(data: &serde_json::Value) {
    let mode = data["cabin"].as_str().unwrap_or("?");
    let mode_colored = match mode {
        "MOVING" => mode.bright_green(),
        "ERROR" => mode.bright_red(),
        _ => mode.bright_white(),
    };
    println!(
        "{} {:>8.3} km  {} {:>7.1} m/s  {} {:>7.1} kg  {} {:<6}  {} {}",
        "alt".dimmed(),
        data["position_km"].as_f64().unwrap_or(0.0),
        "vel".dimmed(),
        data["speed_ms"].as_f64().unwrap_or(0.0),
        "payload".dimmed(),
        data["payload_kg"].as_f64().unwrap_or(0.0),
        "doors".dimmed(),
        data["doors"].as_str().unwrap_or("?"),
        "mode".dimmed(),
        mode_colored,
    );
}

fn print_parcels(reply: &str, format: &str) {
    match format {
        "json" => println!("{}", reply),
        _ => {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(reply) {
                let parcels = parsed["data"].as_array().cloned().unwrap_or_default();
                println!("{} {}", "📦".bright_yellow(), "Parcel Catalog".bright_blue().bold());
                if parcels.is_empty() {
                    println!("{}", "  (empty)".dimmed());
                }
                for parcel in parcels {
                    println!(
                        "  {:<12} {:>8.1} kg  → {:>6.1} km  [{}]",
                        parcel["id"].as_str().unwrap_or("?").bright_white(),
                        parcel["weight_kg"].as_f64().unwrap_or(0.0),
                        parcel["destination_km"].as_f64().unwrap_or(0.0),
                        parcel["status"].as_str().unwrap_or("?").bright_cyan(),
                    );
                }
            }
        }
    }
}
