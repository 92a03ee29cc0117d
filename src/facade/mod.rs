mod service;

pub use service::JsonQl;
