use thiserror::Error;

/// Why a submitted token pair was refused.
///
/// These reasons are for server-side diagnostics only. Clients always see
/// the same generic message, see
/// [`RotatedResponse`](crate::web::rejection::RotatedResponse).
///
/// # Example
/// ```
/// use wzs_guard::error::csrf::CsrfError;
///
/// assert_eq!(CsrfError::Expired.code(), "EXPIRED");
/// ```
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CsrfError {
    /// The request carried no token cookie.
    #[error("csrf cookie is missing")]
    MissingCookie,
    /// The request carried no token in the form field or fallback header.
    #[error("submitted csrf token is missing")]
    MissingSubmittedValue,
    /// The cookie is malformed or was not signed with the current secret.
    #[error("csrf cookie signature is invalid")]
    SignatureInvalid,
    /// The cookie was issued outside the expiry window.
    #[error("csrf token has expired")]
    Expired,
    /// The submitted token is not the one the cookie was issued for.
    #[error("submitted csrf token does not match the cookie")]
    ValueMismatch,
}

impl CsrfError {
    /// Stable reason code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCookie => "MISSING_COOKIE",
            Self::MissingSubmittedValue => "MISSING_SUBMITTED_VALUE",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::Expired => "EXPIRED",
            Self::ValueMismatch => "VALUE_MISMATCH",
        }
    }
}
