
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::ledger::{parse_amount, parse_target_status, OfferLedger};
use crate::models::{OfferId, ProductId, UserId};

pub async fn pending_offers(
    ledger: web::Data<OfferLedger>,
    identity: web::ReqData<Identity>,
    path: web::Path<UserId>,
) -> ApiResult<HttpResponse> {
    let buyer_id = path.into_inner();
    if buyer_id != identity.user_id {
        return Err(ApiError::Forbidden("only the buyer can list their pending offers".into()));
    }

    let offers = ledger.list_pending_for_buyer(buyer_id).await?;
    Ok(HttpResponse::Ok().json(offers))
}

pub async fn seller_offers(
    ledger: web::Data<OfferLedger>,
    identity: web::ReqData<Identity>,
    path: web::Path<UserId>,
) -> ApiResult<HttpResponse> {
    let seller_id = path.into_inner();
    if seller_id != identity.user_id {
        return Err(ApiError::Forbidden("only the seller can list their offers".into()));
    }

    let offers = ledger.list_for_seller(seller_id).await?;
    Ok(HttpResponse::Ok().json(offers))
}

/// Offers on a product are visible to the product's seller only.
pub async fn product_offers(
    ledger: web::Data<OfferLedger>,
    identity: web::ReqData<Identity>,
    path: web::Path<ProductId>,
) -> ApiResult<HttpResponse> {
    let product = ledger.product(path.into_inner()).await?;
    if product.seller_id != identity.user_id {
        return Err(ApiError::Forbidden("only the seller can list offers on this product".into()));
    }

    let offers = ledger.list_for_product(product.id).await?;
    Ok(HttpResponse::Ok().json(offers))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeOfferPayload {
    #[serde(alias = "product_id")]
    product_id: Option<ProductId>,
    #[serde(alias = "buyer_id")]
    buyer_id: Option<UserId>,
    #[serde(default, alias = "offer")]
    amount: Value,
}

/// The buyer defaults to the caller and may not be anyone else. A
/// `seller_id` in the body is ignored; the ledger resolves it.
pub async fn make_offer(
    ledger: web::Data<OfferLedger>,
    identity: web::ReqData<Identity>,
    payload: web::Json<MakeOfferPayload>,
) -> ApiResult<HttpResponse> {
    let amount = parse_amount(&payload.amount)?;
    let product_id = payload
        .product_id
        .ok_or_else(|| ApiError::Validation("Product ID is required".into()))?;
    let buyer_id = payload.buyer_id.unwrap_or(identity.user_id);
    if buyer_id != identity.user_id {
        return Err(ApiError::Forbidden("offers can only be made as yourself".into()));
    }

    let offer = ledger.create(product_id, buyer_id, amount).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Offer made successfully", "offer": offer })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    offer_id: Option<OfferId>,
    status: Option<String>,
}

/// Only the seller the offer is addressed to may settle it.
pub async fn update_offer_status(
    ledger: web::Data<OfferLedger>,
    identity: web::ReqData<Identity>,
    payload: web::Json<UpdateStatusPayload>,
) -> ApiResult<HttpResponse> {
    let (Some(offer_id), Some(status)) = (payload.offer_id, payload.status.as_deref()) else {
        return Err(ApiError::Validation("Offer ID and status are required".into()));
    };
    let status = parse_target_status(status)?;

    let offer = ledger.find(offer_id).await?;
    if offer.seller_id != identity.user_id {
        return Err(ApiError::Forbidden("only the seller can settle this offer".into()));
    }

    let offer = ledger.update_status(offer_id, status).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Offer {} successfully", offer.status),
        "offer": offer,
    })))
}
