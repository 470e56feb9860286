pub mod database;
pub mod entity;
pub mod error;
pub mod identifiers;
pub mod ingestion;
pub mod metrics;
pub mod path_matcher;
pub mod verification;

pub use database::KmsDatabase;
pub use entity::EntityService;
pub use error::ServiceError;
pub use identifiers::{EntityKind, IdentifierTree, IdentifierType, ResolvedIdentifiers};
pub use ingestion::{ChangeProcessor, FeedStats};
pub use verification::{DenialReason, VerificationOutcome, VerificationService};
