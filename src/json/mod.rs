//! JSON interop: rendering decoded streams as JSON text, re-encoding
//! matched records, and converting JSON input to the wire format.

mod json2au;
mod output;
mod reencode;

pub use json2au::encode_json_stream;
pub use output::JsonOutputHandler;
pub use reencode::AuOutputHandler;
