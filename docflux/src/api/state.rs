use std::sync::Arc;

use crate::config::Config;
use crate::processing::{ConversionService, Engines};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<ConversionService>,
}

impl AppState {
    pub fn new(config: Config, engines: Engines) -> Self {
        let service = ConversionService::new(&config, engines);

        Self {
            config: Arc::new(config),
            service: Arc::new(service),
        }
    }
}
