//! SCRAM-SHA-256 authentication (RFC 5802, RFC 7677).
//!
//! The exchange is three messages: client-first, server-first → client-final,
//! server-final. `ScramClient` carries the state between them.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const MECHANISM: &str = "SCRAM-SHA-256";

/// GS2 header for "no channel binding, no authzid"; `biws` is its base64.
const GS2_HEADER: &str = "n,,";
const CHANNEL_BINDING: &str = "biws";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScramError {
    #[error("server message is not valid UTF-8")]
    NotUtf8,
    #[error("server-first-message is missing the {0} attribute")]
    MissingAttribute(&'static str),
    #[error("server-first-message has a malformed {0} attribute")]
    MalformedAttribute(&'static str),
    #[error("server nonce does not extend the client nonce")]
    NonceMismatch,
    #[error("server-final-message reported an error: {0}")]
    ServerRejected(String),
    #[error("server signature does not match")]
    BadServerSignature,
    #[error("SCRAM messages arrived out of order")]
    OutOfOrder,
}

enum State {
    Initial,
    /// client-final sent; holds what is needed to check the server signature
    AwaitingFinal {
        salted_password: [u8; 32],
        auth_message: String,
    },
}

/// SCRAM-SHA-256 client state machine.
pub struct ScramClient {
    password: String,
    client_first_bare: String,
    client_nonce: String,
    state: State,
}

impl ScramClient {
    /// Create a client for `password`.
    ///
    /// PostgreSQL takes the user name from the startup packet, so the SCRAM
    /// user name is sent empty.
    pub fn new(password: &str) -> Self {
        let nonce_bytes: [u8; 18] = rand::thread_rng().gen();
        Self::with_nonce(password, BASE64.encode(nonce_bytes))
    }

    fn with_nonce(password: &str, client_nonce: String) -> Self {
        Self {
            password: password.to_string(),
            client_first_bare: format!("n=,r={}", client_nonce),
            client_nonce,
            state: State::Initial,
        }
    }

    /// client-first-message: `n,,n=,r=<client-nonce>`
    pub fn client_first_message(&self) -> Vec<u8> {
        format!("{}{}", GS2_HEADER, self.client_first_bare).into_bytes()
    }

    /// Consume server-first-message (`r=..,s=..,i=..`) and produce
    /// client-final-message.
    pub fn process_server_first(&mut self, server_msg: &[u8]) -> Result<Vec<u8>, ScramError> {
        if !matches!(self.state, State::Initial) {
            return Err(ScramError::OutOfOrder);
        }
        let server_first = std::str::from_utf8(server_msg).map_err(|_| ScramError::NotUtf8)?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for attr in server_first.split(',') {
            match attr.split_once('=') {
                Some(("r", v)) => nonce = Some(v),
                Some(("s", v)) => {
                    salt = Some(
                        BASE64
                            .decode(v)
                            .map_err(|_| ScramError::MalformedAttribute("salt"))?,
                    )
                }
                Some(("i", v)) => {
                    iterations = Some(
                        v.parse::<u32>()
                            .ok()
                            .filter(|&n| n > 0)
                            .ok_or(ScramError::MalformedAttribute("iteration count"))?,
                    )
                }
                _ => {}
            }
        }

        let nonce = nonce.ok_or(ScramError::MissingAttribute("nonce"))?;
        let salt = salt.ok_or(ScramError::MissingAttribute("salt"))?;
        let iterations = iterations.ok_or(ScramError::MissingAttribute("iteration count"))?;

        if !nonce.starts_with(&self.client_nonce) || nonce.len() == self.client_nonce.len() {
            return Err(ScramError::NonceMismatch);
        }

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            self.password.as_bytes(),
            &salt,
            iterations,
            &mut salted_password,
        );

        let client_key = hmac_sha256(&salted_password, b"Client Key");
        let stored_key: [u8; 32] = Sha256::digest(client_key).into();

        let client_final_without_proof = format!("c={},r={}", CHANNEL_BINDING, nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, server_first, client_final_without_proof
        );

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        self.state = State::AwaitingFinal {
            salted_password,
            auth_message,
        };

        Ok(format!("{},p={}", client_final_without_proof, BASE64.encode(proof)).into_bytes())
    }

    /// Check server-final-message (`v=<signature>` or `e=<error>`).
    pub fn verify_server_final(&self, server_msg: &[u8]) -> Result<(), ScramError> {
        let State::AwaitingFinal {
            salted_password,
            auth_message,
        } = &self.state
        else {
            return Err(ScramError::OutOfOrder);
        };

        let server_final = std::str::from_utf8(server_msg).map_err(|_| ScramError::NotUtf8)?;
        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(ScramError::ServerRejected(err.to_string()));
        }
        let signature = server_final
            .strip_prefix("v=")
            .and_then(|v| BASE64.decode(v).ok())
            .ok_or(ScramError::BadServerSignature)?;

        let server_key = hmac_sha256(salted_password, b"Server Key");
        let mut mac = new_mac(&server_key);
        mac.update(auth_message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ScramError::BadServerSignature)
    }
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length
    <HmacSha256 as Mac>::new_from_slice(key).unwrap_or_else(|_| unreachable!())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = new_mac(key);
    mac.update(data);
    mac.finalize().into_bytes().into()
}
