pub mod dispatch_service;
pub mod ingest_service;
pub mod progress;
pub mod session;
