use std::env;

use cosa_thermostat::{EntryConfig, IntegrationManager};

#[tokio::main]
async fn main() -> cosa_thermostat::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let email = args.get(1).expect("usage: monitor <email> <password> [endpoint-id]");
    let password = args.get(2).expect("usage: monitor <email> <password> [endpoint-id]");

    let mut config = EntryConfig::new(email, password);
    config.endpoint_id = args.get(3).cloned();

    let mut manager = IntegrationManager::new();
    println!("Logging in as {email}...");
    let id = manager.setup(config).await?;
    let coordinator = manager.coordinator(id).expect("setup just succeeded");
    let entities = manager.entities(id).expect("setup just succeeded");
    println!("Connected to {}. Watching for updates...", coordinator.device_id());

    let mut updates = coordinator.subscribe();
    loop {
        let data = updates.borrow_and_update().clone();
        let climate = &entities.climate;
        match &data.snapshot {
            Some(snapshot) if data.last_update_success => println!(
                "[{}] {:.1}\u{00b0}C -> {:?}\u{00b0}C | {:?} | preset: {:?} | {:?}",
                snapshot.name.as_deref().unwrap_or(&snapshot.id),
                snapshot.temperature.unwrap_or_default(),
                climate.target_temperature(),
                climate.hvac_mode(),
                climate.preset_mode(),
                climate.hvac_action(),
            ),
            Some(_) => println!("Update failed, showing last known state"),
            None => println!("No data yet"),
        }
        if updates.changed().await.is_err() {
            break;
        }
    }

    manager.unload(id)
}
