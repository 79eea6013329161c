use std::io;
use std::sync::Arc;

use actix::Actor;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use log::info;

mod auth;
mod channel;
mod config;
mod db;
mod error;
mod events;
mod gateway;
mod handlers;
mod ledger;
mod middleware;
mod models;
mod registry;
mod ws;

#[cfg(test)]
mod testing;

use crate::auth::IdentityVerifier;
use crate::channel::ConversationChannel;
use crate::config::Config;
use crate::gateway::PgGateway;
use crate::ledger::OfferLedger;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let pool = db::connect(&config.database_url, config.max_connections)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
    db::migrate(&pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let gateway = Arc::new(PgGateway::new(pool.clone()));
    let chat_server = ws::ChatServer::new().start();

    let verifier = web::Data::new(IdentityVerifier::new(
        gateway.clone(),
        &config.secret_key,
        config.token_ttl_secs,
        config.bcrypt_cost,
    ));
    let channel = web::Data::new(ConversationChannel::new(
        gateway.clone(),
        chat_server.clone().recipient(),
    ));
    let ledger = web::Data::new(OfferLedger::new(gateway.clone(), gateway));

    info!("listening on {}", config.bind_addr);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(verifier.clone())
            .app_data(channel.clone())
            .app_data(ledger.clone())
            .app_data(web::Data::new(chat_server.clone()))
            .configure(handlers::routes)
    })
    .bind(&config.bind_addr)?
    .run()
    .await;

    pool.close().await;
    server
}
