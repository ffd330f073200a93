pub mod agent;
pub mod faq;
pub mod intent;
pub mod response;
pub mod tool;
