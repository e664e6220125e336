use crate::external_connections::ExternalConnectivity;
use thiserror::Error;
use tracing::{error, info};

/// Marker error raised by driven ports when the identity provider no longer accepts the
/// session's credentials.
#[derive(Debug, Error)]
#[error("the authenticated session has expired")]
pub struct SessionExpired;

pub mod driven_ports {
    use super::*;

    pub trait Identity {
        async fn is_authenticated(
            &self,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
        async fn logout(&self, ext_cxn: &impl ExternalConnectivity) -> Result<(), anyhow::Error>;
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not end the session: {0}")]
    PortError(#[from] anyhow::Error),
}

/// Asks the identity provider whether the current session is valid. A failing check is logged
/// and treated as "not authenticated" so callers can send the user to the login page.
pub async fn check_auth(
    ext_cxn: &impl ExternalConnectivity,
    identity: &impl driven_ports::Identity,
) -> bool {
    match identity.is_authenticated(ext_cxn).await {
        Ok(authenticated) => authenticated,
        Err(err) => {
            error!("Error checking authentication: {err:#}");
            false
        }
    }
}

pub async fn logout(
    ext_cxn: &impl ExternalConnectivity,
    identity: &impl driven_ports::Identity,
) -> Result<(), AuthError> {
    identity.logout(ext_cxn).await?;
    info!("Session ended");

    Ok(())
}
