//! IO modules - external system interfaces
//!
//! - `camera` - HTTP listener the camera posts notifications to
//! - `central_session` - Outbound HTTP session to the central backend
//! - `mock_central` - Local stand-in for the central backend

pub mod camera;
pub mod central_session;
pub mod mock_central;

// Re-export commonly used types
pub use camera::{CameraListener, SessionOutcome};
pub use central_session::{ClientSession, ExchangeError, SessionConfig, Stage};
pub use mock_central::MockCentral;
