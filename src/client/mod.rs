//! Client side of the session: connection, reconciled view and remote smoothing

pub mod connection;
pub mod interpolator;
pub mod view;

pub use connection::{ClientError, KinematicSample, SyncClient, UPLOAD_INTERVAL};
pub use interpolator::{InterpolationConfig, Interpolators, RemoteEntity};
pub use view::ViewState;
