pub mod auth_service;
pub mod bill_service;
pub mod category_service;
pub mod document_service;
pub mod integration_service;
pub mod ocr;
pub mod payment_method_service;
pub mod scanner;
