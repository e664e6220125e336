/// Provides the clients driven adapters use to reach systems outside the application, so the
/// domain can stay agnostic of how (or whether) a backend is contacted.
pub trait ExternalConnectivity {
    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware;
}
