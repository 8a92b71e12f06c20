use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::api;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "X-Boostd-User".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Boostd-User"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Auction API server")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::bids::submit,
        api::handlers::bids::get,
        api::handlers::bids::list,
        api::handlers::credits::grant,
        api::handlers::credits::balance,
        api::handlers::credits::ledger,
        api::handlers::windows::clear,
    ),
    components(
        schemas(
            api::models::bids::BidSubmit,
            api::models::bids::BidResponse,
            api::models::bids::BidSubmitResponse,
            api::models::credits::GrantCreate,
            api::models::credits::GrantResponse,
            api::models::credits::BalanceResponse,
            api::models::credits::LedgerEntryResponse,
            api::models::windows::ClearWindowRequest,
            api::models::windows::ClearWindowResponse,
            crate::db::models::bids::BidStatus,
            crate::db::models::ledger::CreditSource,
            crate::db::models::settings::AuctionSettings,
            crate::types::Locale,
            crate::types::Placement,
        )
    ),
    tags(
        (name = "bids", description = "Sealed-bid submission and listing"),
        (name = "credits", description = "Boost credit ledger"),
        (name = "windows", description = "Operational window clearing"),
    ),
    info(
        title = "Boostd API",
        version = "0.3.0",
        description = "Recurring sealed-bid auctions for boosted placement slots, paid in boost credits",
    ),
)]
pub struct ApiDoc;
