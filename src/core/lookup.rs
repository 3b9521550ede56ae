//! Per-card operations against the card service
//!
//! `check_balance` is the unit of work the orchestrator runs for every card:
//! reset, request, parse, write back. Registration and PIN setting are the
//! two other service flows, exposed for library callers.

use tracing::debug;

use super::parser::parse_balance_page;
use super::traits::CardService;
use crate::types::{CardRecord, CheckerError, ContactInfo, PinCode, ProtocolRequest};

/// Marker text on the page returned after a successful registration
pub const REGISTRATION_SUCCESS_TEXT: &str = "Your card was successfully registered";

/// Marker text on the page returned after a successful PIN change
pub const SET_PIN_SUCCESS_TEXT: &str = "Your card PIN has been set!";

/// Fetch balance and transactions for one card, updating it in place
///
/// Cards rejected by validation are returned as-is without any request.
/// On failure the card is marked invalid with the error, which is also
/// returned; "card not found" is one such outcome.
pub async fn check_balance<S>(service: &S, card: &mut CardRecord) -> Result<(), CheckerError>
where
    S: CardService + ?Sized,
{
    if card.is_rejected_locally() {
        return Err(card
            .error()
            .cloned()
            .unwrap_or_else(|| CheckerError::parse("card rejected without a reason")));
    }

    card.reset();

    let request = ProtocolRequest::BalanceLookup {
        card: card.card_info(),
    };

    let result = match service.send(&request).await {
        Ok(body) => parse_balance_page(&body),
        Err(e) => Err(e),
    };

    match result {
        Ok(page) => {
            debug!(
                card = card.last_four(),
                transactions = page.transactions.len(),
                "balance retrieved"
            );
            card.apply_balance(page.initial_balance, page.available_balance, page.transactions);
            Ok(())
        }
        Err(e) => {
            debug!(card = card.last_four(), error = %e, "balance lookup failed");
            card.mark_invalid(e.clone());
            Err(e)
        }
    }
}

/// Register a card with the given contact details
///
/// # Returns
///
/// * `Ok(true)` if the service confirmed the registration
/// * `Ok(false)` if the flow completed but the confirmation text is absent
/// * `Err` for invalid cards, transport failures, and rejected logins
pub async fn register_card<S>(
    service: &S,
    card: &CardRecord,
    contact: &ContactInfo,
) -> Result<bool, CheckerError>
where
    S: CardService + ?Sized,
{
    if let Some(error) = card.error() {
        return Err(error.clone());
    }

    let body = service
        .send(&ProtocolRequest::Registration {
            card: card.card_info(),
            contact: contact.clone(),
        })
        .await?;

    Ok(body.contains(REGISTRATION_SUCCESS_TEXT))
}

/// Set the card's PIN
///
/// Same return contract as [`register_card`].
pub async fn set_pin<S>(service: &S, card: &CardRecord, pin: &PinCode) -> Result<bool, CheckerError>
where
    S: CardService + ?Sized,
{
    if let Some(error) = card.error() {
        return Err(error.clone());
    }

    let body = service
        .send(&ProtocolRequest::SetPin {
            card: card.card_info(),
            pin: pin.clone(),
        })
        .await?;

    Ok(body.contains(SET_PIN_SUCCESS_TEXT))
}
