//! Server construction and adapter wiring.

mod config;
mod settings;

pub use config::ServerConfig;
pub use settings::{ServiceSettings, SettingsError};

use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use mockable::DefaultClock;
use tracing::info;

use crate::Trace;
use crate::domain::ports::{SpeakerRequestRepository, TrustedReferenceDirectory};
use crate::domain::{SpeakerRequestService, WeightedSignalScorer};
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::speaker_requests;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::json_config;
use crate::outbound::memory::InMemorySpeakerRequestRepository;
use crate::outbound::persistence::DieselSpeakerRequestRepository;

fn build_service<R>(repository: R, config: &ServerConfig) -> HttpState
where
    R: SpeakerRequestRepository + 'static,
{
    let service = SpeakerRequestService::new(
        Arc::new(repository),
        Arc::new(TrustedReferenceDirectory),
        Arc::new(WeightedSignalScorer::new(config.scoring_weights)),
        Arc::new(DefaultClock),
    )
    .with_acceptance_rules(config.acceptance_rules.clone());
    HttpState::from_service(Arc::new(service))
}

/// Wire the domain service onto the configured store.
pub fn build_http_state(config: &ServerConfig) -> HttpState {
    match &config.db_pool {
        Some(pool) => {
            info!(policy = %config.acceptance_rules.policy(), "using PostgreSQL store");
            build_service(DieselSpeakerRequestRepository::new(pool.clone()), config)
        }
        None => {
            info!(policy = %config.acceptance_rules.policy(), "using in-memory store");
            build_service(InMemorySpeakerRequestRepository::new(), config)
        }
    }
}

/// Assemble the Actix application.
pub fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(json_config())
        .wrap(Trace)
        .service(web::scope("/api/v1").configure(speaker_requests::configure))
        .service(ready)
        .service(live)
}

/// Construct an Actix HTTP server from `config`.
///
/// The returned [`Server`] must be awaited to drive the listener; the health
/// state is marked ready once the socket is bound.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let http_state = web::Data::new(build_http_state(&config));
    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || build_app(server_health_state.clone(), http_state.clone()))
        .bind(config.bind_addr)?
        .run();

    info!(bind_addr = %config.bind_addr, "speaker request service listening");
    health_state.mark_ready();
    Ok(server)
}
