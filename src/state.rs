use std::sync::Arc;

use crate::{internal_api::auth::AdminCredentials, validation::ValidationService};

#[derive(Clone)]
pub struct AppState {
    pub validator: ValidationService,
    /// `None` disables the operator routes (they answer 500).
    pub admin: Option<Arc<AdminCredentials>>,
}
