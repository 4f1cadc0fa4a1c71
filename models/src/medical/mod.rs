// models/src/medical/mod.rs

pub mod appointment;
pub mod bill;
pub mod department;
pub mod doctor;
pub mod lab_order;
pub mod medication;
pub mod patient;
pub mod prescription;
pub mod user;

pub use appointment::*;
pub use bill::*;
pub use department::*;
pub use doctor::*;
pub use lab_order::*;
pub use medication::*;
pub use patient::*;
pub use prescription::*;
pub use user::*;
