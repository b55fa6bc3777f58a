use std::collections::HashSet;
use std::sync::{mpsc, Arc, Mutex};
use std::time;

use serial_link::{available_ports, device::SerialPortProvider, ConnectionConfig, SerialConnection};

/// How long to wait for the device to answer a request
const REPLY_TIMEOUT: time::Duration = time::Duration::from_millis(500);

fn main() {
    env_logger::init();

    println!("Ports: {:?}", available_ports(&SerialPortProvider, &HashSet::new()));

    // with a request string, look for a device that answers it and dump what it sends
    let Some(request) = std::env::args().nth(1) else {
        return;
    };
    let request = format!("{}\r\n", request).into_bytes();

    let connection = SerialConnection::new(ConnectionConfig::default());
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    connection.set_interpreter(move |buffer: Vec<u8>, _: &SerialConnection| {
        // receiver is gone only while shutting down
        let _ = tx.send(buffer);
        Vec::new()
    });

    let rx = Arc::new(Mutex::new(rx));
    let check_connection = connection.clone();
    let check_rx = Arc::clone(&rx);
    connection.add_connection_check(move || {
        let Ok(rx) = check_rx.lock() else { return false };
        while rx.try_recv().is_ok() {}
        check_connection.write_to_port(request.clone());
        rx.recv_timeout(REPLY_TIMEOUT).is_ok()
    });

    match connection.find_port(&HashSet::new(), 1) {
        Ok(Some(port)) => println!(
            "Device on {} at {:?} baud",
            port,
            connection.baud_rate()
        ),
        Ok(None) => {
            println!("No device answered");
            return;
        }
        Err(e) => {
            println!("Search failed: {}", e);
            return;
        }
    }

    let start = time::Instant::now();
    while start.elapsed() < time::Duration::from_secs(5) {
        let Ok(rx) = rx.lock() else { break };
        if let Ok(data) = rx.recv_timeout(REPLY_TIMEOUT) {
            println!("{:02X?} {:?}", data, String::from_utf8_lossy(&data));
        }
    }
    connection.detach();
}
