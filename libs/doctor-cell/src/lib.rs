pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{CreateDoctorRequest, Doctor, DoctorError, DoctorSnapshot};
pub use services::{DoctorDirectory, DoctorService};
pub use router::doctor_routes;
