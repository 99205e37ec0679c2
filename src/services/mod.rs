pub mod account_service;
pub mod availability_service;
pub mod booking_service;
pub mod email_service;
pub mod image_service;
pub mod payment_proof_service;
pub mod pricing_service;
pub mod property_service;
pub mod review_service;
