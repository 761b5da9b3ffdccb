use thiserror::Error;

/// Failure modes of the verification lifecycle. None of these are retried
/// internally; every error is scoped to a single request and carries enough
/// information for the caller to pick a user-facing message.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("no phone number found for `{0}`")]
    PhoneNotFound(String),
    #[error("no active verification for this email")]
    NoActiveVerification,
    #[error("verification code expired")]
    Expired,
    #[error("too many verification attempts")]
    TooManyAttempts,
    #[error("verification code does not match")]
    InvalidCode,
    #[error("contact lookup failed: {0}")]
    Directory(#[source] anyhow::Error),
    #[error("code delivery failed: {0}")]
    SendFailed(#[source] anyhow::Error),
}

impl VerifyError {
    /// Message safe to show to the customer, without upstream detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Controleer je invoer en probeer het opnieuw.",
            Self::PhoneNotFound(_) => "Geen telefoonnummer gevonden voor dit emailadres.",
            Self::NoActiveVerification => "Geen actieve verificatie.",
            Self::Expired => "Code verlopen.",
            Self::TooManyAttempts => "Te veel pogingen.",
            Self::InvalidCode => "Ongeldige code.",
            Self::Directory(_) | Self::SendFailed(_) => {
                "Er ging iets mis bij het versturen. Probeer het later opnieuw."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::VerifyError;

    #[test]
    fn upstream_errors_share_a_generic_user_message() {
        let directory = VerifyError::Directory(anyhow::anyhow!("crm timeout"));
        let send = VerifyError::SendFailed(anyhow::anyhow!("provider 500"));

        assert_eq!(directory.user_message(), send.user_message());
    }

    #[test]
    fn domain_errors_keep_their_specific_user_messages() {
        assert_eq!(VerifyError::InvalidCode.user_message(), "Ongeldige code.");
        assert_eq!(VerifyError::TooManyAttempts.user_message(), "Te veel pogingen.");
    }
}
