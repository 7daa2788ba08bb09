pub mod common;
pub mod patroni;

pub use common::{API_VERSION, FIELD_MANAGER, KIND, instance_labels, owner_reference, standard_labels};
