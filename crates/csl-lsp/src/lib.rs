//! Language server for the Config Schema Language.
//!
//! The server speaks JSON-RPC 2.0 with `Content-Length` framing over any
//! duplex byte channel (`BufRead` + `Write`). Dispatch is single-threaded
//! and cooperative: one message is read, handled to completion, and only
//! then is the next message read, so document recomputation always
//! happens before any query on the new text.

mod documents;
mod framing;
mod semantic_tokens;
mod server;
mod uri;

pub use documents::DocumentData;
pub use framing::{read_message, write_message, LineEnding};
pub use semantic_tokens::{
    decode_tokens, encode_tokens, token_type_index, DecodedToken, TOKEN_TYPES,
};
pub use server::LanguageServer;
pub use uri::normalize_uri;
