//! Schema and time-window checks for verified notices.

use crate::claims::Notice;
use crate::error::{PayError, PayResult, ValidationReason};

/// Check a signature-verified notice against the clock reading `now`
/// (seconds since the epoch).
///
/// The first failing check decides the reason. `exp` is exclusive and `nbf`
/// inclusive; there is no leeway on either.
pub fn validate(notice: Notice, now: u64) -> PayResult<Notice> {
    check(&notice, now).map_err(PayError::Validation)?;
    Ok(notice)
}

fn check(notice: &Notice, now: u64) -> Result<(), ValidationReason> {
    if notice.request.is_none() {
        return Err(ValidationReason::MissingRequest);
    }
    let response = notice
        .response
        .as_ref()
        .ok_or(ValidationReason::MissingResponse)?;
    match response.transaction_id.as_deref() {
        Some(id) if !id.is_empty() => {}
        _ => return Err(ValidationReason::MissingTransactionId),
    }

    match notice.exp {
        Some(exp) if now < exp => {}
        _ => return Err(ValidationReason::Expired),
    }
    if let Some(nbf) = notice.nbf {
        if now < nbf {
            return Err(ValidationReason::NotYetValid);
        }
    }
    Ok(())
}
