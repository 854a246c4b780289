use crate::cache::AccessoryCache;
use crate::host::HapHost;
use crate::platform::{DISCOVERY_INTERVAL, Platform};
use crate::settings::Settings;
use crate::web::{self, state::BridgeState};
use anyhow::{Context, Result};
use hap::{
    Config, MacAddress, Pin,
    accessory::{AccessoryCategory, AccessoryInformation, bridge::BridgeAccessory},
    server::{IpServer, Server},
    storage::{FileStorage, Storage},
};
use maxvapor_client_rs::MaxVaporClient;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use uuid::Uuid;

const BRIDGE_AID: u64 = 1;
const MANUFACTURER: &str = "DB Electronics";
/// Setup payload flag for accessories reachable over IP.
const IP_TRANSPORT_FLAG: u64 = 2;

/// Builds the `X-HM://` URI encoded in the pairing QR code.
fn generate_setup_uri(pincode: &str, category: u64, setup_id: &str) -> String {
    let code = pincode.replace('-', "").parse::<u64>().unwrap_or(0);
    // version and reserved bits stay 0
    let payload = ((category & 0xff) << 31) | (IP_TRANSPORT_FLAG << 27) | (code & 0x07ff_ffff);
    format!("X-HM://{:0>9}{setup_id}", base36_encode(payload))
}

fn base36_encode(mut num: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if num == 0 {
        return "0".to_string();
    }
    let mut chars = Vec::new();
    while num > 0 {
        chars.push(DIGITS[(num % 36) as usize] as char);
        num /= 36;
    }
    chars.iter().rev().collect()
}

/// The host's MAC when available, otherwise a random locally administered address.
fn device_id() -> [u8; 6] {
    match mac_address::get_mac_address() {
        Ok(Some(mac)) => mac.bytes(),
        Ok(None) | Err(_) => {
            warn!("No MAC address found, generating a random device id");
            let mut id = [0u8; 6];
            id.copy_from_slice(&Uuid::new_v4().as_bytes()[..6]);
            id[0] = (id[0] | 0x02) & 0xfe;
            id
        }
    }
}

async fn load_or_create_config(storage: &mut FileStorage, settings: &Settings) -> Result<Config> {
    match storage.load_config().await {
        Ok(mut config) => {
            info!("Loaded HAP config");
            config.redetermine_local_ip();
            storage.save_config(&config).await?;
            Ok(config)
        }
        Err(_) => {
            info!("Creating new HAP config");
            let config = Config {
                pin: Pin::new(settings.pairing_code)?,
                name: settings.bridge_name(),
                device_id: MacAddress::from(device_id()),
                category: AccessoryCategory::Bridge,
                ..Default::default()
            };
            storage.save_config(&config).await?;
            Ok(config)
        }
    }
}

pub async fn start_bridge(settings: Settings) -> Result<()> {
    let options = settings.client_options()?;
    let bridge_state = BridgeState::new();
    bridge_state.set_api_host(options.host.clone());
    let client = Arc::new(MaxVaporClient::new(options)?);

    let bridge = BridgeAccessory::new(
        BRIDGE_AID,
        AccessoryInformation {
            name: settings.bridge_name(),
            serial_number: "MAXVAPOR-BRIDGE".into(),
            manufacturer: MANUFACTURER.into(),
            model: "MaxVapor Bridge".into(),
            software_revision: Some(env!("CARGO_PKG_VERSION").into()),
            ..Default::default()
        },
    )?;

    let storage_dir = settings.storage_dir();
    std::fs::create_dir_all(&storage_dir)
        .with_context(|| format!("Failed to create storage directory {storage_dir}"))?;
    let mut storage = FileStorage::new(Path::new(&storage_dir)).await?;
    let config = load_or_create_config(&mut storage, &settings).await?;
    let pin = config.pin.to_string();

    let server = IpServer::new(config, storage).await?;
    info!("IP server created, adding bridge accessory...");
    server.add_accessory(bridge).await?;

    let cache = AccessoryCache::load(&storage_dir).await?;
    let host = Arc::new(HapHost::new(server, cache));
    let platform = Arc::new(Platform::new(client, host.clone(), bridge_state.clone()));
    for cached in host.cached_accessories().await {
        platform.configure_accessory(cached).await;
    }
    info!(
        "{} of {} cached accessories restored",
        platform.attached_count(),
        platform.accessory_count()
    );

    let setup_id = settings.setup_id();
    let uri = generate_setup_uri(&pin, AccessoryCategory::Bridge as u64, &setup_id);
    info!("PIN for the Bridge accessory is: {pin}, setup ID: {setup_id}");
    bridge_state.set_pairing(pin, uri.clone());
    qr2term::print_qr(&uri)?;

    web::start_web_server(settings.web_config(), bridge_state)
        .await
        .context("Failed to start web server")?;

    info!("Starting HAP bridge server...");
    let handle = host.server().run_handle();
    let discovery = tokio::spawn(platform.run(DISCOVERY_INTERVAL));

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let result = tokio::select! {
        res = handle => res.context("HAP server stopped"),
        _ = ctrl_c => {
            info!("signal received, starting graceful shutdown");
            Ok(())
        }
        _ = terminate => {
            info!("signal received, starting graceful shutdown");
            Ok(())
        }
    };
    discovery.abort();
    result
}
