//! midir-backed ports and port discovery

use colored::*;
use midir::{Ignore, MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use super::{resolve_port, InboundEvent, InboundSender, OutputPort, PortOrigin};
use crate::error::{BridgeError, Result};
use crate::midi::{format_hex, MidiMessage};

const CLIENT_NAME: &str = "PadBridge-GW";

/// Input filter: SysEx passes, clock and active sensing are dropped at the port
const INPUT_FILTER: Ignore = Ignore::TimeAndActiveSense;

/// Output connection guarded by a per-port lock
pub struct MidirOutput {
    port_name: String,
    conn: Mutex<MidiOutputConnection>,
}

impl MidirOutput {
    /// Open the output port of a configured device
    pub fn open(device_name: &str) -> Result<Self> {
        let midi_out = MidiOutput::new(&format!("{CLIENT_NAME}-Out")).map_err(|e| {
            BridgeError::PortOpen {
                name: device_name.to_string(),
                message: e.to_string(),
            }
        })?;

        let (port, port_name) =
            find_port(&midi_out, device_name).ok_or_else(|| BridgeError::PortNotFound {
                direction: "output",
                name: device_name.to_string(),
            })?;

        info!("Connecting to output port: {}", port_name);

        let conn = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| BridgeError::PortOpen {
                name: port_name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            port_name,
            conn: Mutex::new(conn),
        })
    }
}

impl OutputPort for MidirOutput {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        self.conn
            .lock()
            .send(data)
            .map_err(|e| BridgeError::Send {
                port: self.port_name.clone(),
                message: e.to_string(),
            })?;

        trace!("TX -> {}: {}", self.port_name, format_hex(data));
        Ok(())
    }
}

/// Open the input port of a configured device
///
/// Every received message, SysEx included, is pushed onto `tx` tagged with
/// `origin`. Timing clock and active sensing never reach the queue. The connection stays open until the returned value is dropped.
pub fn open_input(
    device_name: &str,
    origin: PortOrigin,
    tx: InboundSender,
) -> Result<MidiInputConnection<()>> {
    let mut midi_in = MidiInput::new(&format!("{CLIENT_NAME}-In")).map_err(|e| {
        BridgeError::PortOpen {
            name: device_name.to_string(),
            message: e.to_string(),
        }
    })?;
    midi_in.ignore(INPUT_FILTER);

    let (port, port_name) =
        find_port(&midi_in, device_name).ok_or_else(|| BridgeError::PortNotFound {
            direction: "input",
            name: device_name.to_string(),
        })?;

    info!("Connecting to input port: {}", port_name);

    let log_name = port_name.clone();
    midi_in
        .connect(
            &port,
            CLIENT_NAME,
            move |_timestamp, data, _| {
                match MidiMessage::parse(data) {
                    Some(message) => debug!("RX <- {}: {}", log_name, message),
                    None => debug!("RX <- {}: {}", log_name, format_hex(data)),
                }
                // Receiver gone means the router has shut down
                let _ = tx.send(InboundEvent::new(origin, data));
            },
            (),
        )
        .map_err(|e| BridgeError::PortOpen {
            name: port_name,
            message: e.to_string(),
        })
}

/// Find the first port of `io` whose suffix-stripped name is `device_name`
fn find_port<T: MidiIO>(io: &T, device_name: &str) -> Option<(T::Port, String)> {
    let ports = io.ports();
    let names: Vec<String> = ports
        .iter()
        .map(|port| io.port_name(port).unwrap_or_default())
        .collect();

    let index = resolve_port(names.iter().map(String::as_str), device_name)?;
    debug!("Found port '{}' for device '{}'", names[index], device_name);

    let port = ports.into_iter().nth(index)?;
    Some((port, names[index].clone()))
}

/// Names of all MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(&format!("{CLIENT_NAME}-Scanner"))
        .map_err(|e| BridgeError::PortOpen {
            name: "scanner".to_string(),
            message: e.to_string(),
        })?;
    Ok(port_names(&midi_in))
}

/// Names of all MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new(&format!("{CLIENT_NAME}-Scanner"))
        .map_err(|e| BridgeError::PortOpen {
            name: "scanner".to_string(),
            message: e.to_string(),
        })?;
    Ok(port_names(&midi_out))
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

/// Log every available port at info level
pub fn log_ports() -> Result<()> {
    let inputs = list_input_ports()?;
    let outputs = list_output_ports()?;

    info!("Available MIDI input devices:");
    for (i, name) in inputs.iter().enumerate() {
        info!("  {}. {}", i + 1, name);
    }
    info!("Available MIDI output devices:");
    for (i, name) in outputs.iter().enumerate() {
        info!("  {}. {}", i + 1, name);
    }
    Ok(())
}

/// Print discovered ports with the device name each one resolves to
pub fn print_ports() -> Result<()> {
    let inputs = list_input_ports()?;
    let outputs = list_output_ports()?;

    for (title, names) in [("MIDI Input Ports", inputs), ("MIDI Output Ports", outputs)] {
        println!("\n{}", format!("=== {} ===", title).bold().cyan());
        if names.is_empty() {
            println!("  {}", "(none)".dimmed());
        }
        for (i, name) in names.iter().enumerate() {
            println!(
                "  {}: {}  {} {}",
                i,
                name.bright_white(),
                "device name:".dimmed(),
                super::strip_port_suffix(name).green()
            );
        }
    }
    println!();
    Ok(())
}
