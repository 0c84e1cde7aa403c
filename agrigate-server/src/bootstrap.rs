//! Composition root.
//!
//! Everything with process lifetime is constructed here, once, from the
//! resolved configuration: the registry with all tools, the agent, the
//! auth service with the provisioned super administrator, and the
//! conversation store. No global mutable state.

use std::sync::Arc;

use agrigate_core::{
    Agent, AuthService, Error, GatewayConfig, MemoryConversationStore, MemoryUserStore,
    TokenSigner, ToolRegistry,
};
use agrigate_tools::generate::{generation_extractor, HttpGenerationTool, OfflineGenerationTool};
use agrigate_tools::predict::{
    crop_climate_extractor, crop_nutrients_extractor, fertility_extractor, moisture_extractor,
    pest_extractor, yield_extractor, CropByClimateTool, CropByNutrientsTool, PestDetectionTool,
    SoilFertilityTool, SoilMoistureTool, YieldPredictionTool,
};
use agrigate_tools::retrieval::{rag_extractor, VectorSearchTool};
use agrigate_tools::translate::{translate_extractor, TranslateTool};
use agrigate_tools::weather::{
    weather_extractor, OpenMeteoUpstream, WeatherService, WeatherTool, WeatherUpstream,
};
use agrigate_tools::websearch::{web_search_extractor, WebSearchTool};

use crate::state::AppState;

const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com";

/// Build the tool registry the gateway serves.
///
/// Predictors run on the bundled baselines; retrieval on the bundled
/// index; search and translation register only when an upstream is
/// configured; generation falls back to the offline synthesizer.
pub fn build_registry(
    config: &GatewayConfig,
    weather: Arc<WeatherService>,
) -> Result<ToolRegistry, Error> {
    let mut registry = ToolRegistry::new();

    registry.register(YieldPredictionTool::baseline(), yield_extractor())?;
    registry.register(PestDetectionTool::baseline(), pest_extractor())?;
    registry.register(SoilMoistureTool::baseline(), moisture_extractor())?;
    registry.register(CropByNutrientsTool::baseline(), crop_nutrients_extractor())?;
    registry.register(CropByClimateTool::baseline(), crop_climate_extractor())?;
    registry.register(SoilFertilityTool::baseline(), fertility_extractor())?;
    registry.register(VectorSearchTool::bundled(), rag_extractor())?;
    registry.register(WeatherTool::new(weather), weather_extractor())?;

    if let Some(url) = &config.search_url {
        registry.register(
            WebSearchTool::new(url.clone(), config.search_api_key.clone()),
            web_search_extractor(),
        )?;
    }
    if let Some(url) = &config.translate_url {
        registry.register(TranslateTool::new(url.clone()), translate_extractor())?;
    }
    match &config.generate_url {
        Some(url) => {
            registry.register(HttpGenerationTool::new(url.clone()), generation_extractor())?
        }
        None => registry.register(OfflineGenerationTool, generation_extractor())?,
    }

    Ok(registry)
}

/// Build the full application state with the default weather upstream.
pub async fn build_state(config: GatewayConfig) -> Result<AppState, Error> {
    let weather_url = config
        .weather_url
        .clone()
        .unwrap_or_else(|| DEFAULT_WEATHER_URL.to_string());
    build_state_with_upstream(config, Arc::new(OpenMeteoUpstream::new(weather_url))).await
}

/// Build the application state over an injected weather upstream (tests
/// inject counting fakes here).
pub async fn build_state_with_upstream(
    config: GatewayConfig,
    upstream: Arc<dyn WeatherUpstream>,
) -> Result<AppState, Error> {
    let weather = Arc::new(WeatherService::new(upstream, config.cache_ttl));
    let registry = Arc::new(build_registry(&config, weather.clone())?);

    let agent = Agent::builder()
        .registry(registry.clone())
        .max_iterations(config.max_iterations)
        .deadline(config.request_deadline)
        .generation_tool("generate")
        .build()
        .map_err(|e| Error::Internal(e.to_string()))?;

    let signer = TokenSigner::new(&config.token_secret, config.token_ttl_hours);
    let auth = AuthService::bootstrap(
        Arc::new(MemoryUserStore::new()),
        signer,
        &config.admin_email,
        &config.admin_password,
    )
    .await?;

    Ok(AppState {
        agent: Arc::new(agent),
        registry,
        auth: Arc::new(auth),
        conversations: Arc::new(MemoryConversationStore::new()),
        weather,
        config: Arc::new(config),
    })
}
