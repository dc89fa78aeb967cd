pub mod delete;
pub mod health;
pub mod presign;
pub mod upload;
