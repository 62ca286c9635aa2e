pub mod form;
pub mod ip_extraction;
