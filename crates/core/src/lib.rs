pub mod config;
pub mod errors;
pub mod pricing;
pub mod verify;

pub use errors::VerifyError;
pub use pricing::{
    compute_line_amounts, parse_description_lines, quote_totals, BulletMarker, DescriptionLine,
    LineAmounts, LineItemRecord, QuoteTotals, DEFAULT_TAX_PCT,
};
pub use verify::{
    to_e164, CodeGenerator, CodeSender, ContactDirectory, ContactProfile,
    InMemoryVerificationStore, RandomCodeGenerator, StartedVerification, VerificationRecord,
    VerificationService, VerificationStore,
};
