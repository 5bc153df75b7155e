//! Streaming session: state machine, transport seam, and controller.

pub mod chat;
pub mod controller;
pub mod http;
pub mod state;
pub mod transport;

pub use chat::ChatMessage;
pub use controller::SessionController;
pub use http::{HttpTransport, HttpTransportFactory};
pub use state::SessionState;
pub use transport::{
    AvatarQuality, AvatarTransport, EventStream, StartRequest, TransportEvent, TransportFactory,
    VoiceEmotion,
};
