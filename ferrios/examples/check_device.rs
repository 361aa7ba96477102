//! Run one command on a device and check its output.
//!
//! Settings are read from a JSON file deserialized into
//! [`ControllerSettings`]:
//!
//! ```json
//! {
//!   "hostname": "router",
//!   "address": "192.168.1.1",
//!   "protocol": "ssh",
//!   "test_credentials": {"username": "tester", "password": "pw", "enable_password": "en"}
//! }
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --example check_device -- device.json "show privilege" "level is 15"
//! ```

use std::env;

use ferrios::{Controller, ControllerSettings, Criteria};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=debug shows every line sent and matched
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <settings.json> <command> [expected substring]...", args[0]);
        std::process::exit(1);
    }

    let settings: ControllerSettings = serde_json::from_str(&std::fs::read_to_string(&args[1])?)?;
    let controller = Controller::new(settings);

    let mut descriptor = controller.create_test_cmd(&args[2]);
    let mut criteria = Criteria::new().be_empty(false);
    for expected in &args[3..] {
        criteria = criteria.contain(expected.as_str());
    }
    controller.add_test_cmd_criteria(&mut descriptor, criteria);

    println!("Executing: {}", descriptor.command);
    match controller.run_test_cmd(&descriptor, None).await {
        Ok(()) => println!("[+] passed"),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    }

    Ok(())
}
