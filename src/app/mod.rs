// Application layer: use cases composed from the parser and the store ports

pub mod registration_use_case;

pub use registration_use_case::{RegistrationOutcome, RegistrationUseCase, Rejection};
