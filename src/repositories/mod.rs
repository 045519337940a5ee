pub(crate) mod exam_records;
pub(crate) mod health;
pub(crate) mod mistakes;
pub(crate) mod questions;
pub(crate) mod stats;
pub(crate) mod user_data;
pub(crate) mod users;
