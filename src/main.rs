use std::{
    process,
    sync::{Arc, OnceLock},
};

use pressbee::{
    config::Config,
    core::{debounce::DebounceController, readiness::Readiness},
    detect::{DetectionSource, ProbeListener},
    logger::LoggerManager,
    print_error,
};
use pressbee_mqtt::{MqttManager, Publisher};
use tokio::time::Duration;
use tracing::{debug, error, info};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

fn log_buttons_table(config: &Config) {
    let address_width = config
        .buttons
        .mapping
        .iter()
        .map(|b| b.address.len())
        .max()
        .unwrap_or(17)
        .max("Address".len());

    let header = format!("{:<width$} | Topic", "Address", width = address_width);
    let sep = format!("{}-+-{}", "-".repeat(address_width), "-".repeat(24));

    info!("{}", header);
    info!("{}", sep);

    for button in &config.buttons.mapping {
        info!(
            "{:<width$} | {}",
            button.address,
            button.topic,
            width = address_width
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config();
    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting pressbee version {}...", env!("CARGO_PKG_VERSION"));
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.listener);

    log_buttons_table(cfg);

    info!(
        "Connecting to MQTT broker at {}:{}...",
        cfg.transport.host, cfg.transport.port
    );
    let manager = MqttManager::from_config(cfg.transport.clone()).unwrap_or_else(|e| {
        error!("Failed to create MQTT manager: {}", e);
        process::exit(1);
    });
    let instance = manager.build_and_start().await.unwrap_or_else(|e| {
        error!("Failed to start MQTT transport: {}", e);
        process::exit(1);
    });

    let readiness = Readiness::default();
    readiness.start_listening(instance.state_receiver()).await;

    // Block for the first ready transition, and only the first: reconnects
    // later on must not re-run any of the setup below.
    if let Err(reason) = readiness.wait_ready().await {
        error!("Broker connection failed at startup: {}", reason);
        process::exit(1);
    }
    info!("Broker connection ready");

    let publisher = Publisher::new(&instance);
    let controller = Arc::new(DebounceController::new(
        Arc::new(publisher),
        Duration::from_secs(cfg.buttons.revert_delay),
    ));

    let cancel_token = instance.cancel_token();
    let listener = Arc::new(ProbeListener::new(&cfg.listener, cancel_token.clone()));

    info!("Listening for {} buttons", cfg.buttons.mapping.len());
    for button in &cfg.buttons.mapping {
        match listener.register(&button.address).await {
            Ok(mut signals) => {
                let controller = controller.clone();
                let address = button.address.clone();
                let topic = button.topic.clone();
                tokio::spawn(async move {
                    while signals.recv().await.is_some() {
                        info!("Button press detected on {} for {}", address, topic);
                        controller.on_detected(&topic).await;
                    }
                });
            }
            // One bad entry must not take the other buttons down with it.
            Err(e) => error!("Failed to register button {}: {}", button.address, e),
        }
    }

    let listener_task = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.run().await })
    };

    info!("Waiting for buttons to be pressed");

    tokio::select! {
        result = listener_task => {
            match result {
                Ok(Err(e)) => {
                    error!("Probe listener failed: {}", e);
                    instance.shutdown().await.ok();
                    process::exit(1);
                }
                _ => error!("Probe listener unexpectedly finished"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C — initiating graceful shutdown...");

            if let Err(e) = instance.shutdown().await {
                error!("Error during MQTT shutdown: {}", e);
            }
            tokio::time::sleep(Duration::from_millis(300)).await;

            info!("Shutdown complete");
        }
    }
    Ok(())
}
