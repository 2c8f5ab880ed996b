pub mod render;
pub mod session;
pub mod transport;

pub use render::markdown_to_html;
pub use session::{ ChatSession, Message, SubmitOutcome };
pub use transport::{ ChatTransport, HttpTransport, TransportError };
