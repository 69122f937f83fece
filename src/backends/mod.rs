//! Backend drivers
//!
//! One module per fleet backend. `create_backend` picks the driver named in
//! the settings.

pub mod goserver;
pub mod memory;
pub mod osqueryi;

use std::sync::Arc;

use crate::core::{BackendApi, BackendError, DriverId};
use crate::settings::Settings;

pub use goserver::GoserverBackend;
pub use memory::MemoryBackend;
pub use osqueryi::OsqueryiBackend;

/// Build the backend selected by `settings.api_driver`
pub fn create_backend(settings: &Settings) -> Result<Arc<dyn BackendApi>, BackendError> {
    let driver = settings.driver()?;
    tracing::debug!("initializing backend driver: {}", driver.display_name());

    let backend: Arc<dyn BackendApi> = match driver {
        DriverId::Memory => Arc::new(MemoryBackend::demo()),
        DriverId::Goserver => {
            let insecure = settings.backend.insecure_tls || settings.debug_enabled;
            if settings.debug_enabled && !settings.backend.insecure_tls {
                tracing::warn!("debug is enabled, accepting invalid TLS certificates");
            }
            Arc::new(GoserverBackend::new(
                &settings.backend.base_url,
                settings.backend_timeout(),
                insecure,
            )?)
        }
        DriverId::Osqueryi => Arc::new(OsqueryiBackend::new(
            &settings.backend.osqueryi_path,
            settings.backend_timeout(),
        )?),
    };

    Ok(backend)
}
