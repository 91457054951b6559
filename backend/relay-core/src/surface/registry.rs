//! Registry of live UI surfaces.
//!
//! Owned by the application shell and handed by clone to the inbound relay,
//! the outbound relay and the IPC server. Renderers register when they attach
//! and unregister when they detach; relays only read.

use crate::error::surface::SurfaceError;
use crate::surface::{Surface, SurfaceId};

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::RwLock;
use uuid::Uuid;

struct RegisteredSurface {
    instance: Uuid,
    surface: Arc<dyn Surface>,
}

/// Shared map of surface id to the renderer currently attached for it.
///
/// This type is `Clone`; all clones share the same map.
#[derive(Clone, Default)]
pub struct SurfaceRegistry {
    surfaces: Arc<RwLock<HashMap<SurfaceId, RegisteredSurface>>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a surface, replacing any previous one for the same id.
    ///
    /// Returns the instance id to pass to [`SurfaceRegistry::unregister`].
    pub async fn register(&self, id: SurfaceId, surface: Arc<dyn Surface>) -> Uuid {
        let instance = Uuid::new_v4();
        let mut surfaces = self.surfaces.write().await;

        if surfaces
            .insert(id, RegisteredSurface { instance, surface })
            .is_some()
        {
            warn!("Replacing existing {id} surface with instance {instance}");
        } else {
            info!("Registered {id} surface (instance {instance})");
        }

        instance
    }

    /// Detach a surface if `instance` is still the one registered.
    ///
    /// A renderer that reconnected has already replaced the old instance; the
    /// stale disconnect must not remove the new one.
    pub async fn unregister(&self, id: SurfaceId, instance: Uuid) -> bool {
        let mut surfaces = self.surfaces.write().await;

        match surfaces.get(&id) {
            Some(registered) if registered.instance == instance => {
                surfaces.remove(&id);
                info!("Unregistered {id} surface (instance {instance})");
                true
            }
            Some(_) => {
                debug!("Ignoring stale unregister for {id} (instance {instance})");
                false
            }
            None => false,
        }
    }

    /// The registered surface for `id`, if it is still alive.
    pub async fn get(&self, id: SurfaceId) -> Option<Arc<dyn Surface>> {
        let surfaces = self.surfaces.read().await;
        surfaces
            .get(&id)
            .filter(|registered| registered.surface.is_alive())
            .map(|registered| Arc::clone(&registered.surface))
    }

    /// Ids of every surface currently alive.
    pub async fn live_surfaces(&self) -> Vec<SurfaceId> {
        let surfaces = self.surfaces.read().await;
        SurfaceId::ALL
            .into_iter()
            .filter(|id| {
                surfaces
                    .get(id)
                    .is_some_and(|registered| registered.surface.is_alive())
            })
            .collect()
    }

    /// Deliver `(event, payload)` to the surface registered for `id`.
    ///
    /// # Errors
    ///
    /// - [`SurfaceError::Unavailable`] if nothing is registered for `id`
    /// - [`SurfaceError::Closed`] if the registered renderer has gone away
    pub async fn forward(
        &self,
        id: SurfaceId,
        event: &str,
        payload: &str,
    ) -> Result<(), SurfaceError> {
        let surface = {
            let surfaces = self.surfaces.read().await;
            let registered = surfaces.get(&id).ok_or(SurfaceError::Unavailable {
                surface: id,
                location: ErrorLocation::from(Location::caller()),
            })?;
            Arc::clone(&registered.surface)
        };

        if !surface.is_alive() {
            return Err(SurfaceError::Closed {
                surface: id,
                message: String::from("renderer disconnected"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        surface.emit(event, payload)
    }
}
