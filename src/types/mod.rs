pub mod concept;
pub mod error;
pub mod feedback;
pub mod persona;
pub mod utils;

pub use concept::ProductConcept;
pub use error::{ErrorCategory, ErrorClassifier, LlmError, MarketError, Result};
pub use feedback::CriticFeedback;
pub use persona::{AgeBracket, IncomeLevel, LocationType, Persona, PersonaResponse};
pub use utils::{json_string, json_string_list, json_u8, log_filter_warn};
