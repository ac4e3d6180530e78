//! Domain errors and the error taxonomy shared by every layer

mod domain_error;

pub use domain_error::{DomainError, ErrorKind};
