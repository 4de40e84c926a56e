use std::sync::Arc;

use crate::assets::AssetLoader;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Logo and signature resolver. Default: HttpAssetLoader over a shared reqwest client.
    pub assets: Arc<dyn AssetLoader>,
}
